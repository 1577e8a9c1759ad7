//! Error types for providers, the recorder, configuration and the session.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Per-tick provider failure. Never fatal: the field is left empty for the tick.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("previous read still running")]
    Busy,
    #[error("baseline recorded, no delta yet")]
    NoBaseline,
    #[error("read failed: {0}")]
    Read(String),
    #[error("collector task failed: {0}")]
    Task(String),
}

impl ProviderError {
    /// Expected on startup or under load; not worth a warning.
    pub fn is_quiet(&self) -> bool {
        matches!(self, ProviderError::NoBaseline | ProviderError::Busy)
    }
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("write to {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} exists but is not a resmon CSV log (header mismatch)")]
    NotALog { path: PathBuf },
    #[error("recorder already closed")]
    Closed,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("interval must be greater than zero")]
    ZeroInterval,
    #[error("{what} must be a finite, non-negative number of seconds (got {value})")]
    InvalidSeconds { what: &'static str, value: f64 },
    #[error("duration {duration:?} is shorter than the interval {interval:?}")]
    DurationShorterThanInterval {
        duration: Duration,
        interval: Duration,
    },
    #[error("provider timeout must be greater than zero")]
    ZeroProviderTimeout,
    #[error("flush policy needs at least one row per flush")]
    ZeroFlushRows,
}

/// Failure reported by a sink while accepting a sample.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Recorder(#[from] RecorderError),
    #[error("{0}")]
    Other(String),
}

/// Terminal session failure; each variant maps to a process exit status.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("recorder failed: {0}")]
    Recorder(#[source] SinkError),
    #[error("session already ran")]
    AlreadyRun,
}

impl SessionError {
    pub fn exit_code(&self) -> u8 {
        match self {
            SessionError::Config(_) | SessionError::AlreadyRun => 2,
            SessionError::Recorder(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_config_from_io() {
        let cfg = SessionError::Config(ConfigError::ZeroInterval);
        let io = SessionError::Recorder(SinkError::Recorder(RecorderError::Closed));
        assert_eq!(cfg.exit_code(), 2);
        assert_eq!(io.exit_code(), 1);
        assert_ne!(io.exit_code(), 0);
    }

    #[test]
    fn quiet_errors_are_startup_and_load_conditions() {
        assert!(ProviderError::NoBaseline.is_quiet());
        assert!(ProviderError::Busy.is_quiet());
        assert!(!ProviderError::Read("denied".into()).is_quiet());
        assert!(!ProviderError::Timeout(Duration::from_millis(5)).is_quiet());
    }
}
