//! Physical memory usage. Used = total - available, as top-style tools report it.

use std::sync::Arc;

use async_trait::async_trait;
use sysinfo::System;
use tokio::sync::Mutex;

use super::{read_blocking, MetricProvider, Shared, Support};
use crate::error::ProviderError;
use crate::types::{percent_of, MemMetric, Metric, MetricKind};

pub struct MemoryProvider {
    sys: Shared<System>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self {
            sys: Arc::new(Mutex::new(System::new())),
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricProvider for MemoryProvider {
    fn kind(&self) -> MetricKind {
        MetricKind::Memory
    }

    async fn probe(&mut self) -> Support {
        if sysinfo::IS_SUPPORTED_SYSTEM {
            Support::Supported
        } else {
            Support::Unsupported("sysinfo does not support this OS".into())
        }
    }

    async fn sample(&mut self) -> Result<Metric, ProviderError> {
        read_blocking(&self.sys, |sys| {
            sys.refresh_memory();
            let total_bytes = sys.total_memory();
            if total_bytes == 0 {
                return Err(ProviderError::Read("total memory reported as 0".into()));
            }
            let used_bytes = total_bytes.saturating_sub(sys.available_memory());
            Ok(Metric::Memory(MemMetric {
                used_bytes,
                total_bytes,
                percent: percent_of(used_bytes, total_bytes),
            }))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_used_within_total() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }
        let mut p = MemoryProvider::new();
        assert_eq!(p.probe().await, Support::Supported);
        match p.sample().await {
            Ok(Metric::Memory(m)) => {
                assert!(m.total_bytes > 0);
                assert!(m.used_bytes <= m.total_bytes);
                assert!((0.0..=100.0).contains(&m.percent));
            }
            other => panic!("expected memory metric, got {other:?}"),
        }
    }
}
