//! Session lifecycle: INIT → RUNNING → STOPPING → STOPPED.
//!
//! INIT validates the configuration, probes providers and opens the recorder.
//! RUNNING hands control to the sampler. STOPPING closes every sink, durable
//! ones last so a side channel cannot hold up the final flush. STOPPED is
//! terminal; a session is never restarted.

use std::fmt;
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::providers::MetricProvider;
use crate::recorder::Recorder;
use crate::sampler::{ExcludedProvider, ProviderStats, Sampler, StopReason, StopSignal};
use crate::sink::{SampleSink, SinkKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Init => "init",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// What a finished session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub stop: StopReason,
    pub output_path: PathBuf,
    pub ticks: u64,
    pub rows_recorded: u64,
    pub skipped_slots: u64,
    pub excluded: Vec<ExcludedProvider>,
    pub providers: Vec<ProviderStats>,
}

pub struct Session {
    config: SessionConfig,
    state: SessionState,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            config,
            state: SessionState::Init,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn enter(&mut self, next: SessionState) {
        info!(from = %self.state, to = %next, "session state");
        self.state = next;
    }

    /// Run with a CSV recorder at the configured path followed by `displays`.
    pub async fn run(
        &mut self,
        providers: Vec<Box<dyn MetricProvider>>,
        displays: Vec<Box<dyn SampleSink>>,
        stop: StopSignal,
    ) -> Result<SessionReport, SessionError> {
        let mut prepared = self.prepare(providers).await?;
        let recorder = match Recorder::open(&self.config.output_path, self.config.flush) {
            Ok(r) => r,
            Err(e) => {
                error!(path = %self.config.output_path.display(), "{e}");
                self.enter(SessionState::Stopped);
                return Err(SessionError::Recorder(e.into()));
            }
        };
        info!(path = %recorder.path().display(), "recording");
        let mut sinks: Vec<Box<dyn SampleSink>> = Vec::with_capacity(displays.len() + 1);
        sinks.push(Box::new(recorder));
        sinks.extend(displays);
        self.drive(&mut prepared, sinks, stop).await
    }

    /// Run against caller-supplied sinks; no recorder is opened.
    pub async fn run_with_sinks(
        &mut self,
        providers: Vec<Box<dyn MetricProvider>>,
        sinks: Vec<Box<dyn SampleSink>>,
        stop: StopSignal,
    ) -> Result<SessionReport, SessionError> {
        let mut prepared = self.prepare(providers).await?;
        self.drive(&mut prepared, sinks, stop).await
    }

    async fn prepare(
        &mut self,
        providers: Vec<Box<dyn MetricProvider>>,
    ) -> Result<(Sampler, Vec<ExcludedProvider>), SessionError> {
        if self.state != SessionState::Init {
            warn!(state = %self.state, "session already ran");
            return Err(SessionError::AlreadyRun);
        }
        if let Err(e) = self.config.validate() {
            self.enter(SessionState::Stopped);
            return Err(e.into());
        }
        let mut sampler = Sampler::from_config(&self.config);
        let excluded = sampler.probe(providers).await;
        info!(
            interval = ?self.config.interval,
            duration = ?self.config.duration,
            providers = ?sampler.active_providers(),
            "session ready"
        );
        Ok((sampler, excluded))
    }

    async fn drive(
        &mut self,
        prepared: &mut (Sampler, Vec<ExcludedProvider>),
        mut sinks: Vec<Box<dyn SampleSink>>,
        mut stop: StopSignal,
    ) -> Result<SessionReport, SessionError> {
        let (sampler, excluded) = prepared;
        self.enter(SessionState::Running);
        let summary = sampler.run(&mut sinks, &mut stop).await;

        self.enter(SessionState::Stopping);
        let close_err = close_all(&mut sinks);
        drop(sinks);
        self.enter(SessionState::Stopped);

        if let Some(failure) = summary.failure {
            error!(sink = %failure.sink, error = %failure.error, "durable sink failed; session aborted");
            return Err(SessionError::Recorder(failure.error));
        }
        if let Some(e) = close_err {
            return Err(SessionError::Recorder(e));
        }

        let report = SessionReport {
            stop: summary.stop,
            output_path: self.config.output_path.clone(),
            ticks: summary.ticks,
            rows_recorded: summary.recorded,
            skipped_slots: summary.skipped,
            excluded: std::mem::take(excluded),
            providers: summary.providers,
        };
        info!(
            stop = ?report.stop,
            ticks = report.ticks,
            rows = report.rows_recorded,
            skipped = report.skipped_slots,
            "session finished"
        );
        Ok(report)
    }
}

/// Close side channels first, then durable sinks. Returns the first durable
/// close failure; side-channel failures are only logged.
fn close_all(sinks: &mut [Box<dyn SampleSink>]) -> Option<crate::error::SinkError> {
    let mut first = None;
    for kind in [SinkKind::SideChannel, SinkKind::Durable] {
        for sink in sinks.iter_mut().filter(|s| s.kind() == kind) {
            if let Err(e) = sink.close() {
                match kind {
                    SinkKind::SideChannel => warn!(sink = sink.name(), "close failed: {e}"),
                    SinkKind::Durable => {
                        error!(sink = sink.name(), "close failed: {e}");
                        first.get_or_insert(e);
                    }
                }
            }
        }
    }
    first
}
