//! GPU readings: NVML for NVIDIA devices, gfxinfo for whatever else is active.
//!
//! Presence is decided once in `probe`. A host with no device is Unsupported
//! and never queried again; a device that later fails to answer is a
//! transient failure for that tick only.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::Nvml;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{read_blocking, MetricProvider, Shared, Support};
use crate::error::ProviderError;
use crate::types::{GpuDevice, GpuMetric, Metric, MetricKind};

enum Backend {
    Unprobed,
    Absent,
    Nvml(Nvml),
    Gfx,
}

pub struct GpuProvider {
    backend: Shared<Backend>,
}

impl GpuProvider {
    pub fn new() -> Self {
        Self {
            backend: Arc::new(Mutex::new(Backend::Unprobed)),
        }
    }
}

impl Default for GpuProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricProvider for GpuProvider {
    fn kind(&self) -> MetricKind {
        MetricKind::Gpu
    }

    async fn probe(&mut self) -> Support {
        let detected = read_blocking(&self.backend, |b| {
            // vendor libraries have been seen to panic on odd driver setups
            let found = catch_unwind(AssertUnwindSafe(detect))
                .map_err(|_| ProviderError::Task("gpu detection panicked".into()))?;
            let label = match &found {
                Backend::Nvml(_) => Some("nvml"),
                Backend::Gfx => Some("gfxinfo"),
                _ => None,
            };
            *b = found;
            Ok(label)
        })
        .await;
        match detected {
            Ok(Some(backend)) => {
                debug!(backend, "gpu detected");
                Support::Supported
            }
            Ok(None) => Support::Unsupported("no GPU device found".into()),
            Err(e) => Support::Unsupported(e.to_string()),
        }
    }

    async fn sample(&mut self) -> Result<Metric, ProviderError> {
        read_blocking(&self.backend, |b| {
            let devices = match b {
                Backend::Nvml(nvml) => read_nvml(nvml)?,
                Backend::Gfx => catch_unwind(read_gfx)
                    .map_err(|_| ProviderError::Task("gfxinfo panicked".into()))??,
                Backend::Unprobed | Backend::Absent => {
                    return Err(ProviderError::Read("gpu backend not available".into()))
                }
            };
            Ok(Metric::Gpu(GpuMetric { devices }))
        })
        .await
    }
}

fn detect() -> Backend {
    match Nvml::init() {
        Ok(nvml) => match nvml.device_count() {
            Ok(n) if n > 0 => return Backend::Nvml(nvml),
            Ok(_) => debug!("nvml loaded but reports no devices"),
            Err(e) => debug!("nvml device count failed: {e}"),
        },
        Err(e) => debug!("nvml unavailable: {e}"),
    }
    match gfxinfo::active_gpu() {
        Ok(_) => Backend::Gfx,
        Err(e) => {
            debug!("gfxinfo found no active gpu: {e}");
            Backend::Absent
        }
    }
}

fn read_nvml(nvml: &Nvml) -> Result<Vec<GpuDevice>, ProviderError> {
    let count = nvml
        .device_count()
        .map_err(|e| ProviderError::Read(e.to_string()))?;
    let mut devices = Vec::with_capacity(count as usize);
    for index in 0..count {
        let reading = nvml.device_by_index(index).and_then(|dev| {
            let util = dev.utilization_rates()?;
            let mem = dev.memory_info()?;
            Ok(GpuDevice {
                index,
                name: dev.name().unwrap_or_else(|_| format!("GPU {index}")),
                utilization_percent: util.gpu.min(100) as f32,
                memory_used_bytes: mem.used,
                memory_total_bytes: mem.total,
                temperature_celsius: dev.temperature(TemperatureSensor::Gpu).ok().map(|t| t as f32),
            })
        });
        match reading {
            Ok(d) => devices.push(d),
            Err(e) => warn!(index, "gpu device read failed: {e}"),
        }
    }
    if devices.is_empty() {
        return Err(ProviderError::Read("no gpu device answered".into()));
    }
    Ok(devices)
}

fn read_gfx() -> Result<Vec<GpuDevice>, ProviderError> {
    let gpu = gfxinfo::active_gpu().map_err(|e| ProviderError::Read(e.to_string()))?;
    let info = gpu.info();
    Ok(vec![GpuDevice {
        index: 0,
        name: gpu.model().to_string(),
        utilization_percent: (info.load_pct() as f32).min(100.0),
        memory_used_bytes: info.used_vram(),
        memory_total_bytes: info.total_vram(),
        temperature_celsius: None,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sample_before_probe_is_a_read_failure() {
        let mut p = GpuProvider::new();
        assert!(matches!(p.sample().await, Err(ProviderError::Read(_))));
    }

    #[tokio::test]
    async fn unsupported_host_stays_unsupported() {
        let mut p = GpuProvider::new();
        if p.probe().await != Support::Supported {
            assert!(p.sample().await.is_err());
        }
    }
}
