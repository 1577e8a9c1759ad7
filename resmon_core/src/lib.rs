//! resmon_core: host resource sampling on a fixed, anchored cadence.
//!
//! Providers read CPU, memory, disk and GPU state; the sampler calls them
//! concurrently once per tick and fans each sample out to a CSV recorder and
//! any live views; the session drives the whole lifecycle.

pub mod config;
pub mod error;
pub mod providers;
pub mod recorder;
pub mod sampler;
pub mod session;
pub mod sink;
pub mod types;

pub use config::{FlushPolicy, SessionConfig};
pub use error::{ConfigError, ProviderError, RecorderError, SessionError, SinkError};
pub use providers::{default_providers, MetricProvider, Support};
pub use recorder::{Recorder, CSV_HEADER};
pub use sampler::{stop_channel, ExcludedProvider, ProviderStats, Sampler, StopHandle, StopReason, StopSignal};
pub use session::{Session, SessionReport, SessionState};
pub use sink::{DisplayFeed, DisplayReceiver, SampleSink, SinkKind};
pub use types::{CpuMetric, DiskMetric, GpuDevice, GpuMetric, MemMetric, Metric, MetricKind, Sample, VolumeUsage};
