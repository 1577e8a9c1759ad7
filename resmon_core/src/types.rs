//! Data types produced by providers and carried through the sampler to sinks.
//! A `None` field on a [`Sample`] means "no reading", never "zero".

use std::time::Duration;

use chrono::{DateTime, Local};

#[derive(Debug, Clone, PartialEq)]
pub struct CpuMetric {
    pub utilization_percent: f32, // 0..100
    pub per_core: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemMetric {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub percent: f32,
}

/// One mounted volume, kept for the live view only.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeUsage {
    pub name: String,
    pub mount_point: String,
    pub file_system: String,
    pub used_bytes: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiskMetric {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub percent: f32,
    // bytes since the previous successful sample; None until a baseline exists
    pub read_bytes_delta: Option<u64>,
    pub write_bytes_delta: Option<u64>,
    pub volumes: Vec<VolumeUsage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpuDevice {
    pub index: u32,
    pub name: String,
    pub utilization_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub temperature_celsius: Option<f32>,
}

/// Readings for every GPU on the host, in device index order.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuMetric {
    pub devices: Vec<GpuDevice>,
}

impl GpuMetric {
    pub fn mean_utilization(&self) -> Option<f32> {
        if self.devices.is_empty() {
            return None;
        }
        let sum: f32 = self.devices.iter().map(|d| d.utilization_percent).sum();
        Some(sum / self.devices.len() as f32)
    }

    pub fn memory_used(&self) -> u64 {
        self.devices.iter().map(|d| d.memory_used_bytes).sum()
    }

    pub fn memory_total(&self) -> u64 {
        self.devices.iter().map(|d| d.memory_total_bytes).sum()
    }

    /// Hottest device; None when no device reports a temperature.
    pub fn max_temperature(&self) -> Option<f32> {
        self.devices
            .iter()
            .filter_map(|d| d.temperature_celsius)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }
}

/// Resource a provider reports on. Also fixes which [`Sample`] field it fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Cpu,
    Memory,
    Disk,
    Gpu,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::Disk => "disk",
            MetricKind::Gpu => "gpu",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider's snapshot for a single tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    Cpu(CpuMetric),
    Memory(MemMetric),
    Disk(DiskMetric),
    Gpu(GpuMetric),
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Cpu(_) => MetricKind::Cpu,
            Metric::Memory(_) => MetricKind::Memory,
            Metric::Disk(_) => MetricKind::Disk,
            Metric::Gpu(_) => MetricKind::Gpu,
        }
    }
}

/// One row: every reading gathered during a single tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Anchored tick index (skipped slots leave gaps).
    pub seq: u64,
    /// Monotonic offset from session start.
    pub elapsed: Duration,
    pub wall: DateTime<Local>,
    pub cpu: Option<CpuMetric>,
    pub memory: Option<MemMetric>,
    pub disk: Option<DiskMetric>,
    pub gpu: Option<GpuMetric>,
}

impl Sample {
    pub fn empty(seq: u64, elapsed: Duration, wall: DateTime<Local>) -> Self {
        Self {
            seq,
            elapsed,
            wall,
            cpu: None,
            memory: None,
            disk: None,
            gpu: None,
        }
    }

    /// Place a metric in its field. A later metric of the same kind wins.
    pub fn insert(&mut self, metric: Metric) {
        match metric {
            Metric::Cpu(m) => self.cpu = Some(m),
            Metric::Memory(m) => self.memory = Some(m),
            Metric::Disk(m) => self.disk = Some(m),
            Metric::Gpu(m) => self.gpu = Some(m),
        }
    }

    pub fn present_fields(&self) -> usize {
        [
            self.cpu.is_some(),
            self.memory.is_some(),
            self.disk.is_some(),
            self.gpu.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.present_fields() == 0
    }
}

pub(crate) fn percent_of(used: u64, total: u64) -> f32 {
    if total == 0 {
        0.0
    } else {
        (used as f64 / total as f64 * 100.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(index: u32, util: f32, used: u64, total: u64, temp: Option<f32>) -> GpuDevice {
        GpuDevice {
            index,
            name: format!("gpu{index}"),
            utilization_percent: util,
            memory_used_bytes: used,
            memory_total_bytes: total,
            temperature_celsius: temp,
        }
    }

    #[test]
    fn gpu_aggregates_across_devices() {
        let g = GpuMetric {
            devices: vec![
                device(0, 20.0, 1_000, 8_000, Some(55.0)),
                device(1, 60.0, 3_000, 8_000, Some(71.0)),
            ],
        };
        assert_eq!(g.mean_utilization(), Some(40.0));
        assert_eq!(g.memory_used(), 4_000);
        assert_eq!(g.memory_total(), 16_000);
        assert_eq!(g.max_temperature(), Some(71.0));
    }

    #[test]
    fn gpu_without_devices_or_sensors_has_no_aggregates() {
        let none = GpuMetric { devices: vec![] };
        assert_eq!(none.mean_utilization(), None);
        let cold = GpuMetric {
            devices: vec![device(0, 5.0, 0, 0, None)],
        };
        assert_eq!(cold.max_temperature(), None);
    }

    #[test]
    fn insert_fills_matching_field_and_zero_is_present() {
        let mut s = Sample::empty(0, Duration::ZERO, Local::now());
        assert!(s.is_empty());
        s.insert(Metric::Cpu(CpuMetric {
            utilization_percent: 0.0,
            per_core: vec![],
        }));
        assert_eq!(s.present_fields(), 1);
        assert_eq!(s.cpu.as_ref().map(|c| c.utilization_percent), Some(0.0));
        assert!(s.memory.is_none());
    }

    #[test]
    fn percent_handles_zero_total() {
        assert_eq!(percent_of(5, 0), 0.0);
        assert_eq!(percent_of(25, 100), 25.0);
    }
}
