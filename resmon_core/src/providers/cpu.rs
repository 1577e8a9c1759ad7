//! Global and per-core CPU utilisation via sysinfo.
//!
//! Usage is a delta between two refreshes, so the first read only records a
//! baseline and reports no value.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio::sync::Mutex;
use tracing::warn;

use super::{read_blocking, MetricProvider, Shared, Support};
use crate::error::ProviderError;
use crate::types::{CpuMetric, Metric, MetricKind};

struct CpuState {
    sys: System,
    primed: bool,
}

pub struct CpuProvider {
    state: Shared<CpuState>,
    // sampling period, when known, to check against sysinfo's refresh floor
    interval: Option<Duration>,
}

impl CpuProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CpuState {
                sys: System::new(),
                primed: false,
            })),
            interval: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

/// sysinfo needs this much time between refreshes for usage to mean anything.
fn below_refresh_floor(interval: Duration) -> bool {
    interval < MINIMUM_CPU_UPDATE_INTERVAL
}

impl Default for CpuProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricProvider for CpuProvider {
    fn kind(&self) -> MetricKind {
        MetricKind::Cpu
    }

    async fn probe(&mut self) -> Support {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Support::Unsupported("sysinfo does not support this OS".into());
        }
        if let Some(interval) = self.interval.filter(|i| below_refresh_floor(*i)) {
            warn!(
                ?interval,
                minimum = ?MINIMUM_CPU_UPDATE_INTERVAL,
                "interval is below the CPU refresh floor; usage readings will be unreliable"
            );
        }
        Support::Supported
    }

    async fn sample(&mut self) -> Result<Metric, ProviderError> {
        read_blocking(&self.state, |st| {
            st.sys.refresh_cpu_all();
            if !st.primed {
                st.primed = true;
                return Err(ProviderError::NoBaseline);
            }
            let per_core: Vec<f32> = st
                .sys
                .cpus()
                .iter()
                .map(|c| c.cpu_usage().clamp(0.0, 100.0))
                .collect();
            if per_core.is_empty() {
                return Err(ProviderError::Read("no CPUs listed".into()));
            }
            Ok(Metric::Cpu(CpuMetric {
                utilization_percent: st.sys.global_cpu_usage().clamp(0.0, 100.0),
                per_core,
            }))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_floor_check() {
        assert!(below_refresh_floor(Duration::ZERO));
        assert!(!below_refresh_floor(MINIMUM_CPU_UPDATE_INTERVAL));
        assert!(!below_refresh_floor(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn short_interval_is_still_supported() {
        let mut p = CpuProvider::new().with_interval(Duration::from_millis(1));
        let expected = if sysinfo::IS_SUPPORTED_SYSTEM {
            Support::Supported
        } else {
            Support::Unsupported("sysinfo does not support this OS".into())
        };
        assert_eq!(p.probe().await, expected);
    }

    #[tokio::test]
    async fn first_read_is_baseline_only() {
        let mut p = CpuProvider::new();
        assert!(matches!(p.sample().await, Err(ProviderError::NoBaseline)));
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        match p.sample().await {
            Ok(Metric::Cpu(c)) => {
                assert!((0.0..=100.0).contains(&c.utilization_percent));
                assert!(!c.per_core.is_empty());
            }
            other => panic!("expected cpu metric, got {other:?}"),
        }
    }
}
