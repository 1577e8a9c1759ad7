//! Session configuration and validation.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_FLUSH_AGE: Duration = Duration::from_secs(60);
pub const DEFAULT_FLUSH_ROWS: usize = 10;

/// When buffered rows are pushed to the file: whichever bound is hit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    pub max_rows: usize,
    pub max_age: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_FLUSH_ROWS,
            max_age: DEFAULT_FLUSH_AGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub interval: Duration,
    /// None runs until cancelled.
    pub duration: Option<Duration>,
    pub output_path: PathBuf,
    /// Per-provider budget per tick; defaults to 80% of `interval`.
    pub provider_timeout: Option<Duration>,
    pub flush: FlushPolicy,
}

impl SessionConfig {
    pub fn new(interval: Duration, duration: Option<Duration>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            interval,
            duration,
            output_path: output_path.into(),
            provider_timeout: None,
            flush: FlushPolicy::default(),
        }
    }

    /// Build from CLI-style second values. Rejects negative, NaN and infinite input.
    pub fn from_secs(
        interval_secs: f64,
        duration_secs: Option<f64>,
        output_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let interval = secs("interval", interval_secs)?;
        let duration = duration_secs.map(|d| secs("duration", d)).transpose()?;
        let cfg = Self::new(interval, duration, output_path);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = Some(timeout);
        self
    }

    pub fn with_flush(mut self, flush: FlushPolicy) -> Self {
        self.flush = flush;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if let Some(d) = self.duration {
            if d < self.interval {
                return Err(ConfigError::DurationShorterThanInterval {
                    duration: d,
                    interval: self.interval,
                });
            }
        }
        if self.provider_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroProviderTimeout);
        }
        if self.flush.max_rows == 0 {
            return Err(ConfigError::ZeroFlushRows);
        }
        Ok(())
    }

    pub fn effective_provider_timeout(&self) -> Duration {
        self.provider_timeout
            .unwrap_or_else(|| self.interval.mul_f64(0.8))
    }
}

fn secs(what: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidSeconds { what, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_secs_accepts_fractional_interval() {
        let cfg = SessionConfig::from_secs(0.25, Some(1.0), "out.csv").unwrap();
        assert_eq!(cfg.interval, Duration::from_millis(250));
        assert_eq!(cfg.duration, Some(Duration::from_secs(1)));
        assert_eq!(cfg.effective_provider_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn rejects_zero_negative_and_nan_interval() {
        assert_eq!(
            SessionConfig::from_secs(0.0, None, "x").unwrap_err(),
            ConfigError::ZeroInterval
        );
        assert!(matches!(
            SessionConfig::from_secs(-1.0, None, "x").unwrap_err(),
            ConfigError::InvalidSeconds { what: "interval", .. }
        ));
        assert!(matches!(
            SessionConfig::from_secs(f64::NAN, None, "x").unwrap_err(),
            ConfigError::InvalidSeconds { .. }
        ));
    }

    #[test]
    fn rejects_duration_shorter_than_interval() {
        let err = SessionConfig::from_secs(2.0, Some(1.0), "x").unwrap_err();
        assert!(matches!(err, ConfigError::DurationShorterThanInterval { .. }));
        // equal is allowed: exactly one sample
        assert!(SessionConfig::from_secs(2.0, Some(2.0), "x").is_ok());
    }

    #[test]
    fn explicit_provider_timeout_wins_and_must_be_positive() {
        let cfg = SessionConfig::new(Duration::from_secs(1), None, "x")
            .with_provider_timeout(Duration::from_millis(300));
        assert_eq!(cfg.effective_provider_timeout(), Duration::from_millis(300));
        let bad = cfg.with_provider_timeout(Duration::ZERO);
        assert_eq!(bad.validate(), Err(ConfigError::ZeroProviderTimeout));
    }

    #[test]
    fn flush_rows_must_be_positive() {
        let cfg = SessionConfig::new(Duration::from_secs(1), None, "x").with_flush(FlushPolicy {
            max_rows: 0,
            max_age: Duration::from_secs(1),
        });
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroFlushRows));
    }
}
