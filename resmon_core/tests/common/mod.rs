//! Fake providers and sinks shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use resmon_core::{
    CpuMetric, MemMetric, Metric, MetricKind, MetricProvider, ProviderError, Sample, SampleSink,
    SinkError, SinkKind, Support,
};
use tokio::time::Instant;

pub fn cpu(v: f32) -> Metric {
    Metric::Cpu(CpuMetric {
        utilization_percent: v,
        per_core: vec![v],
    })
}

pub fn mem(used: u64, total: u64) -> Metric {
    Metric::Memory(MemMetric {
        used_bytes: used,
        total_bytes: total,
        percent: used as f32 / total as f32 * 100.0,
    })
}

/// Replays a fixed script, one entry per call. `None` entries fail the call;
/// once the script runs out every call fails.
pub struct Scripted {
    kind: MetricKind,
    script: VecDeque<Option<Metric>>,
    pub calls: Arc<AtomicUsize>,
}

impl Scripted {
    pub fn new(kind: MetricKind, script: Vec<Option<Metric>>) -> Self {
        Self {
            kind,
            script: script.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn cpu(values: &[Option<f32>]) -> Self {
        Self::new(MetricKind::Cpu, values.iter().map(|v| v.map(cpu)).collect())
    }
}

#[async_trait]
impl MetricProvider for Scripted {
    fn kind(&self) -> MetricKind {
        self.kind
    }

    async fn probe(&mut self) -> Support {
        Support::Supported
    }

    async fn sample(&mut self) -> Result<Metric, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .pop_front()
            .flatten()
            .ok_or_else(|| ProviderError::Read("scripted failure".into()))
    }
}

/// Always answers, but only after `delay` of (tokio) time.
pub struct Slow {
    kind: MetricKind,
    delay: Duration,
    value: Metric,
    pub calls: Arc<AtomicUsize>,
}

impl Slow {
    pub fn new(delay: Duration, value: Metric) -> Self {
        Self {
            kind: value.kind(),
            delay,
            value,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl MetricProvider for Slow {
    fn kind(&self) -> MetricKind {
        self.kind
    }

    async fn probe(&mut self) -> Support {
        Support::Supported
    }

    async fn sample(&mut self) -> Result<Metric, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.value.clone())
    }
}

/// Answers call `n` with `value(n)` after the `n`-th delay, cycling through
/// `delays`, so completion order within a tick varies from tick to tick.
pub struct Jittery {
    kind: MetricKind,
    delays: Vec<Duration>,
    value: fn(u64) -> Metric,
    calls: u64,
}

impl Jittery {
    pub fn new(kind: MetricKind, delays: &[Duration], value: fn(u64) -> Metric) -> Self {
        Self {
            kind,
            delays: delays.to_vec(),
            value,
            calls: 0,
        }
    }
}

#[async_trait]
impl MetricProvider for Jittery {
    fn kind(&self) -> MetricKind {
        self.kind
    }

    async fn probe(&mut self) -> Support {
        Support::Supported
    }

    async fn sample(&mut self) -> Result<Metric, ProviderError> {
        let n = self.calls;
        self.calls += 1;
        let delay = self.delays[n as usize % self.delays.len()];
        tokio::time::sleep(delay).await;
        Ok((self.value)(n))
    }
}

/// Reports itself unsupported and counts any sample call made anyway.
pub struct Unsupported {
    kind: MetricKind,
    pub calls: Arc<AtomicUsize>,
}

impl Unsupported {
    pub fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl MetricProvider for Unsupported {
    fn kind(&self) -> MetricKind {
        self.kind
    }

    async fn probe(&mut self) -> Support {
        Support::Unsupported("no such device".into())
    }

    async fn sample(&mut self) -> Result<Metric, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Read("should never be called".into()))
    }
}

/// Keeps every sample it is handed.
#[derive(Clone, Default)]
pub struct Collect {
    pub samples: Arc<Mutex<Vec<Arc<Sample>>>>,
    pub closed: Arc<AtomicUsize>,
}

impl Collect {
    pub fn taken(&self) -> Vec<Arc<Sample>> {
        self.samples.lock().unwrap().clone()
    }
}

impl SampleSink for Collect {
    fn name(&self) -> &str {
        "collect"
    }

    fn accept(&mut self, sample: &Arc<Sample>) -> Result<(), SinkError> {
        self.samples.lock().unwrap().push(Arc::clone(sample));
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Notes the (tokio) instant each sample arrives.
#[derive(Clone, Default)]
pub struct Stamped {
    pub arrivals: Arc<Mutex<Vec<(u64, Instant)>>>,
}

impl Stamped {
    pub fn taken(&self) -> Vec<(u64, Instant)> {
        self.arrivals.lock().unwrap().clone()
    }
}

impl SampleSink for Stamped {
    fn name(&self) -> &str {
        "stamped"
    }

    fn accept(&mut self, sample: &Arc<Sample>) -> Result<(), SinkError> {
        self.arrivals.lock().unwrap().push((sample.seq, Instant::now()));
        Ok(())
    }
}

/// Accepts `ok_rows` samples, then fails every call.
pub struct FailAfter {
    kind: SinkKind,
    ok_rows: usize,
    pub accepted: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl FailAfter {
    pub fn new(kind: SinkKind, ok_rows: usize) -> Self {
        Self {
            kind,
            ok_rows,
            accepted: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl SampleSink for FailAfter {
    fn name(&self) -> &str {
        "fail-after"
    }

    fn kind(&self) -> SinkKind {
        self.kind
    }

    fn accept(&mut self, _sample: &Arc<Sample>) -> Result<(), SinkError> {
        if self.accepted.load(Ordering::SeqCst) >= self.ok_rows {
            return Err(SinkError::Other("disk full".into()));
        }
        self.accepted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
