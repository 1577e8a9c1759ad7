//! Anchored tick loop: fans out to providers, assembles one sample per tick,
//! and hands it to every sink in tick order.
//!
//! Ticks are due at `start + k * interval`. A tick whose work overruns makes
//! the loop skip the slots it missed instead of queueing them, so at most one
//! sample is ever being assembled.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures::future::join_all;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio::task::block_in_place;
use tokio::time::{interval_at, sleep_until, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{ProviderError, SinkError};
use crate::providers::{MetricProvider, Support};
use crate::sink::{SampleSink, SinkKind};
use crate::types::{Metric, MetricKind, Sample};

/// Requests a stop from outside the loop (signal handler, quit key, tests).
#[derive(Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    /// A signal nobody can trigger; the run ends only by duration or sink failure.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once a stop was requested. Pends forever if every handle is gone.
    pub async fn stopped(&mut self) {
        if self.0.wait_for(|s| *s).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(Arc::new(tx)), StopSignal(rx))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    DurationElapsed,
    Cancelled,
    SinkFailed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderStats {
    pub name: String,
    pub invocations: u64,
    pub successes: u64,
    pub timeouts: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedProvider {
    pub name: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct SinkFailure {
    pub sink: String,
    pub error: SinkError,
}

#[derive(Debug)]
pub struct RunSummary {
    pub stop: StopReason,
    pub ticks: u64,
    /// Samples accepted by at least one durable sink.
    pub recorded: u64,
    /// Anchored slots passed over because a tick overran.
    pub skipped: u64,
    pub providers: Vec<ProviderStats>,
    pub failure: Option<SinkFailure>,
}

struct ProviderSlot {
    provider: Box<dyn MetricProvider>,
    kind: MetricKind,
    timeout: Duration,
    stats: ProviderStats,
    failing: bool,
}

impl ProviderSlot {
    /// One timed call. Timeouts and errors become an absent field.
    async fn poll(&mut self) -> Option<Metric> {
        self.stats.invocations += 1;
        let outcome = match timeout(self.timeout, self.provider.sample()).await {
            Ok(r) => r,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        };
        match outcome {
            Ok(metric) if metric.kind() == self.kind => {
                self.stats.successes += 1;
                if self.failing {
                    info!(provider = %self.stats.name, "provider recovered");
                    self.failing = false;
                }
                Some(metric)
            }
            Ok(metric) => {
                self.stats.failures += 1;
                warn!(
                    provider = %self.stats.name,
                    got = %metric.kind(),
                    "provider returned a metric of the wrong kind; dropped"
                );
                None
            }
            Err(e) => {
                if matches!(e, ProviderError::Timeout(_)) {
                    self.stats.timeouts += 1;
                } else {
                    self.stats.failures += 1;
                }
                if e.is_quiet() || self.failing {
                    debug!(provider = %self.stats.name, error = %e, "no reading this tick");
                } else {
                    warn!(provider = %self.stats.name, error = %e, "provider failed; field left empty");
                    self.failing = true;
                }
                None
            }
        }
    }
}

pub struct Sampler {
    interval: Duration,
    duration: Option<Duration>,
    provider_timeout: Duration,
    slots: Vec<ProviderSlot>,
}

impl Sampler {
    pub fn new(interval: Duration, duration: Option<Duration>, provider_timeout: Duration) -> Self {
        Self {
            interval,
            duration,
            provider_timeout,
            slots: Vec::new(),
        }
    }

    pub fn from_config(cfg: &SessionConfig) -> Self {
        Self::new(cfg.interval, cfg.duration, cfg.effective_provider_timeout())
    }

    /// Probe each provider once. Supported ones join the tick; the rest are
    /// returned and never called again.
    pub async fn probe(&mut self, providers: Vec<Box<dyn MetricProvider>>) -> Vec<ExcludedProvider> {
        let mut excluded = Vec::new();
        for mut provider in providers {
            let name = provider.name().to_string();
            match provider.probe().await {
                Support::Supported => {
                    debug!(provider = %name, "provider enabled");
                    self.slots.push(ProviderSlot {
                        kind: provider.kind(),
                        provider,
                        timeout: self.provider_timeout,
                        stats: ProviderStats {
                            name,
                            ..Default::default()
                        },
                        failing: false,
                    });
                }
                Support::Unsupported(reason) => {
                    info!(provider = %name, %reason, "provider unsupported on this host; excluded");
                    excluded.push(ExcludedProvider { name, reason });
                }
            }
        }
        excluded
    }

    pub fn active_providers(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.stats.name.as_str()).collect()
    }

    pub fn stats(&self) -> Vec<ProviderStats> {
        self.slots.iter().map(|s| s.stats.clone()).collect()
    }

    /// Call every provider concurrently, each under its own timeout, and
    /// assemble whatever came back.
    pub async fn collect(&mut self, seq: u64, elapsed: Duration) -> Sample {
        let wall = Local::now();
        let metrics = join_all(self.slots.iter_mut().map(|slot| slot.poll())).await;
        let mut sample = Sample::empty(seq, elapsed, wall);
        for metric in metrics.into_iter().flatten() {
            sample.insert(metric);
        }
        sample
    }

    /// Tick until the duration elapses, a stop is requested, or a durable sink
    /// fails. A stop is only observed between ticks, so the sample in flight
    /// always reaches every sink first.
    pub async fn run(&mut self, sinks: &mut [Box<dyn SampleSink>], stop: &mut StopSignal) -> RunSummary {
        let start = Instant::now();
        let end = self.duration.map(|d| start + d);
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut live = vec![true; sinks.len()];
        let mut summary = RunSummary {
            stop: StopReason::Cancelled,
            ticks: 0,
            recorded: 0,
            skipped: 0,
            providers: Vec::new(),
            failure: None,
        };
        let mut last_seq: Option<u64> = None;

        loop {
            let slot = tokio::select! {
                biased;
                _ = stop.stopped() => {
                    summary.stop = StopReason::Cancelled;
                    break;
                }
                _ = sleep_until_opt(end) => {
                    summary.stop = StopReason::DurationElapsed;
                    break;
                }
                at = ticker.tick() => at,
            };

            let seq = slot_index(start, slot, self.interval);
            if let Some(prev) = last_seq {
                let missed = seq.saturating_sub(prev + 1);
                if missed > 0 {
                    summary.skipped += missed;
                    debug!(missed, "tick overran; skipped slots");
                }
            }
            last_seq = Some(seq);

            let sample = Arc::new(self.collect(seq, start.elapsed()).await);
            summary.ticks += 1;
            if sample.is_empty() {
                debug!(seq, "all providers empty this tick");
            }

            match deliver(sinks, &mut live, &sample) {
                Ok(true) => summary.recorded += 1,
                Ok(false) => {}
                Err(failure) => {
                    summary.stop = StopReason::SinkFailed(failure.sink.clone());
                    summary.failure = Some(failure);
                    break;
                }
            }
        }

        summary.providers = self.stats();
        summary
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => sleep_until(d).await,
        None => std::future::pending().await,
    }
}

fn slot_index(start: Instant, at: Instant, period: Duration) -> u64 {
    let offset = at.saturating_duration_since(start).as_nanos();
    let period = period.as_nanos().max(1);
    // round to nearest: timer instants can land a hair off the slot
    ((offset + period / 2) / period) as u64
}

/// Hand the sample to each live sink in order. Returns whether a durable sink
/// took it; a durable failure stops delivery, a side-channel failure only
/// retires that sink.
fn deliver(
    sinks: &mut [Box<dyn SampleSink>],
    live: &mut [bool],
    sample: &Arc<Sample>,
) -> Result<bool, SinkFailure> {
    let mut recorded = false;
    for (sink, alive) in sinks.iter_mut().zip(live.iter_mut()) {
        if !*alive {
            continue;
        }
        let kind = sink.kind();
        let result = match kind {
            SinkKind::Durable => accept_off_worker(sink.as_mut(), sample),
            SinkKind::SideChannel => sink.accept(sample),
        };
        match (result, kind) {
            (Ok(()), SinkKind::Durable) => recorded = true,
            (Ok(()), SinkKind::SideChannel) => {}
            (Err(error), SinkKind::Durable) => {
                return Err(SinkFailure {
                    sink: sink.name().to_string(),
                    error,
                })
            }
            (Err(error), SinkKind::SideChannel) => {
                warn!(sink = sink.name(), %error, "side-channel sink failed; detached");
                *alive = false;
            }
        }
    }
    Ok(recorded)
}

/// Durable sinks write to disk. On a multi-threaded runtime the write runs
/// with the worker handed off, so a stalled disk does not hold up timers
/// scheduled on the same worker. Current-thread runtimes cannot hand off.
fn accept_off_worker(sink: &mut dyn SampleSink, sample: &Arc<Sample>) -> Result<(), SinkError> {
    match Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => block_in_place(|| sink.accept(sample)),
        _ => sink.accept(sample),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_index_rounds_to_nearest_anchor() {
        let start = Instant::now();
        let p = Duration::from_millis(10);
        assert_eq!(slot_index(start, start, p), 0);
        assert_eq!(slot_index(start, start + Duration::from_millis(30), p), 3);
        assert_eq!(slot_index(start, start + Duration::from_micros(29_990), p), 3);
    }

    #[tokio::test]
    async fn stop_signal_resolves_after_stop() {
        let (handle, mut signal) = stop_channel();
        assert!(!signal.is_stopped());
        handle.stop();
        signal.stopped().await;
        assert!(signal.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn never_signal_does_not_resolve() {
        let mut signal = StopSignal::never();
        let waited = tokio::time::timeout(Duration::from_secs(60), signal.stopped()).await;
        assert!(waited.is_err());
    }
}
