//! Disk space across mounted volumes plus read/write byte deltas.
//!
//! Cumulative I/O counters from the previous successful read are kept per
//! device so each tick can report bytes moved since the last one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use sysinfo::Disks;
use tokio::sync::Mutex;

use super::{read_blocking, MetricProvider, Shared, Support};
use crate::error::ProviderError;
use crate::types::{percent_of, DiskMetric, Metric, MetricKind, VolumeUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IoTotals {
    read: u64,
    written: u64,
}

/// Last cumulative counters seen for each device, keyed by device name.
type IoBaseline = HashMap<String, IoTotals>;

struct DiskState {
    disks: Disks,
    prev_io: IoBaseline,
}

/// One refreshed volume with its device's cumulative I/O counters.
struct VolumeReading {
    usage: VolumeUsage,
    total_read: u64,
    total_written: u64,
}

pub struct DiskProvider {
    state: Shared<DiskState>,
}

impl DiskProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DiskState {
                disks: Disks::new(),
                prev_io: HashMap::new(),
            })),
        }
    }
}

impl Default for DiskProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricProvider for DiskProvider {
    fn kind(&self) -> MetricKind {
        MetricKind::Disk
    }

    async fn probe(&mut self) -> Support {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Support::Unsupported("sysinfo does not support this OS".into());
        }
        let found = read_blocking(&self.state, |st| {
            st.disks.refresh(true);
            Ok(st.disks.list().iter().any(|d| d.total_space() > 0))
        })
        .await;
        match found {
            Ok(true) => Support::Supported,
            Ok(false) => Support::Unsupported("no mounted volumes with capacity".into()),
            Err(e) => Support::Unsupported(e.to_string()),
        }
    }

    async fn sample(&mut self) -> Result<Metric, ProviderError> {
        read_blocking(&self.state, |st| {
            st.disks.refresh(true);
            let readings: Vec<VolumeReading> = st
                .disks
                .list()
                .iter()
                .map(|d| {
                    let total = d.total_space();
                    let io = d.usage();
                    VolumeReading {
                        usage: VolumeUsage {
                            name: d.name().to_string_lossy().into_owned(),
                            mount_point: d.mount_point().to_string_lossy().into_owned(),
                            file_system: d.file_system().to_string_lossy().into_owned(),
                            used_bytes: total.saturating_sub(d.available_space()),
                            total_bytes: total,
                        },
                        total_read: io.total_read_bytes,
                        total_written: io.total_written_bytes,
                    }
                })
                .collect();
            summarize(readings, &mut st.prev_io).map(Metric::Disk)
        })
        .await
    }
}

/// Fold volumes into one reading and advance the per-device I/O baseline.
///
/// A device mounted more than once is counted once. Deltas are summed only
/// over devices present in both this and the previous reading; a device seen
/// for the first time, or whose counters went backwards, only sets its own
/// baseline. With no device to compare the deltas are absent.
fn summarize(
    readings: Vec<VolumeReading>,
    prev_io: &mut IoBaseline,
) -> Result<DiskMetric, ProviderError> {
    let mut seen = HashSet::new();
    let mut volumes = Vec::new();
    let mut now_io = IoBaseline::new();
    for r in readings {
        if r.usage.total_bytes == 0 || !seen.insert(r.usage.name.clone()) {
            continue;
        }
        now_io.insert(
            r.usage.name.clone(),
            IoTotals {
                read: r.total_read,
                written: r.total_written,
            },
        );
        volumes.push(r.usage);
    }
    if volumes.is_empty() {
        return Err(ProviderError::Read("no volumes with capacity".into()));
    }

    let mut delta: Option<IoTotals> = None;
    for (name, now) in &now_io {
        let Some(p) = prev_io.get(name) else {
            continue;
        };
        if now.read < p.read || now.written < p.written {
            continue;
        }
        let d = delta.get_or_insert(IoTotals { read: 0, written: 0 });
        d.read = d.read.saturating_add(now.read - p.read);
        d.written = d.written.saturating_add(now.written - p.written);
    }
    // unmounted devices drop out of the baseline
    *prev_io = now_io;
    let (read_bytes_delta, write_bytes_delta) = match delta {
        Some(d) => (Some(d.read), Some(d.written)),
        None => (None, None),
    };

    let used_bytes: u64 = volumes.iter().map(|v| v.used_bytes).sum();
    let total_bytes: u64 = volumes.iter().map(|v| v.total_bytes).sum();
    Ok(DiskMetric {
        used_bytes,
        total_bytes,
        percent: percent_of(used_bytes, total_bytes),
        read_bytes_delta,
        write_bytes_delta,
        volumes,
    })
}
