//! Headless view: one log event per sample instead of a terminal UI.

use std::sync::Arc;

use resmon_core::{Sample, SampleSink, SinkError};
use tracing::info;

use crate::ui::util::{human, pct_or_na, NA};

#[derive(Default)]
pub struct LogSink;

impl SampleSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn accept(&mut self, s: &Arc<Sample>) -> Result<(), SinkError> {
        info!(
            target: "resmon::sample",
            tick = s.seq,
            elapsed_ms = s.elapsed.as_millis() as u64,
            cpu = %pct_or_na(s.cpu.as_ref().map(|c| c.utilization_percent)),
            mem = %mem_summary(s),
            disk = %pct_or_na(s.disk.as_ref().map(|d| d.percent)),
            gpu = %pct_or_na(s.gpu.as_ref().and_then(|g| g.mean_utilization())),
            "sample"
        );
        Ok(())
    }
}

fn mem_summary(s: &Sample) -> String {
    match s.memory.as_ref() {
        Some(m) => format!("{} / {} ({:.1}%)", human(m.used_bytes), human(m.total_bytes), m.percent),
        None => NA.to_string(),
    }
}
