//! Metric providers: one per resource kind, each owning its cross-tick state.

pub mod cpu;
pub mod disk;
pub mod gpu;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::ProviderError;
use crate::types::{Metric, MetricKind};

pub use cpu::CpuProvider;
pub use disk::DiskProvider;
pub use gpu::GpuProvider;
pub use memory::MemoryProvider;

/// Outcome of the one-time startup probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Support {
    Supported,
    Unsupported(String),
}

/// A source of one resource's readings.
///
/// `probe` runs once before the first tick; an `Unsupported` answer removes
/// the provider for the rest of the session. `sample` runs once per tick under
/// a timeout enforced by the sampler, so implementations may be dropped
/// mid-call and must not leave their state inconsistent when that happens.
#[async_trait]
pub trait MetricProvider: Send {
    fn kind(&self) -> MetricKind;

    fn name(&self) -> &str {
        self.kind().as_str()
    }

    async fn probe(&mut self) -> Support;

    async fn sample(&mut self) -> Result<Metric, ProviderError>;
}

/// Provider-owned state handed to the blocking pool for a single read.
pub(crate) type Shared<T> = Arc<Mutex<T>>;

/// Run a blocking read against provider state on tokio's blocking pool.
///
/// If a previous read timed out and is still holding the state, this returns
/// `Busy` instead of queueing behind it.
pub(crate) async fn read_blocking<T, R, F>(state: &Shared<T>, f: F) -> Result<R, ProviderError>
where
    T: Send + 'static,
    R: Send + 'static,
    F: FnOnce(&mut T) -> Result<R, ProviderError> + Send + 'static,
{
    let mut guard = state
        .clone()
        .try_lock_owned()
        .map_err(|_| ProviderError::Busy)?;
    tokio::task::spawn_blocking(move || f(&mut *guard))
        .await
        .map_err(|e| ProviderError::Task(e.to_string()))?
}

/// The four host providers in CSV column order. GPU is left out when disabled.
pub fn default_providers(interval: Duration, gpu: bool) -> Vec<Box<dyn MetricProvider>> {
    let mut v: Vec<Box<dyn MetricProvider>> = vec![
        Box::new(CpuProvider::new().with_interval(interval)),
        Box::new(MemoryProvider::new()),
        Box::new(DiskProvider::new()),
    ];
    if gpu {
        v.push(Box::new(GpuProvider::new()));
    }
    v
}
