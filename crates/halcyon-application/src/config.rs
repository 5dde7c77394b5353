//! Polling configuration.

use std::time::Duration;

use halcyon_core::Result;
use serde::Deserialize;

/// Delay before the first status poll of a freshly started task.
///
/// Distinct from the steady interval: a task is essentially never done
/// instantly, so the first poll is held back a little.
pub const DEFAULT_INITIAL_POLL_DELAY_MS: u64 = 2500;
/// Steady-state interval between subsequent polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Timing policy for the poll scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub initial_delay_ms: u64,
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_POLL_DELAY_MS,
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl PollConfig {
    /// Parses a configuration from TOML, filling omitted keys with
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the document is not valid TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PollConfig::default();
        assert_eq!(config.initial_delay(), Duration::from_millis(2500));
        assert_eq!(config.interval(), Duration::from_millis(5000));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = PollConfig::from_toml_str("interval_ms = 1000").unwrap();
        assert_eq!(config.interval_ms, 1000);
        assert_eq!(config.initial_delay_ms, DEFAULT_INITIAL_POLL_DELAY_MS);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(PollConfig::from_toml_str("interval_ms = [").is_err());
    }
}
