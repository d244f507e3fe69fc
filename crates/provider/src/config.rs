//! Transport settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing of the dapp side of the message transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportConfig {
    /// Interval between `connect` envelopes while waiting for the wallet to
    /// acknowledge.
    #[serde(with = "humantime_serde")]
    pub connect_interval: Duration,

    /// Interval between checks that the wallet side is still open.
    #[serde(with = "humantime_serde")]
    pub liveness_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_interval: Duration::from_millis(250),
            liveness_interval: Duration::from_millis(1250),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_humantime_durations() {
        let config: TransportConfig = toml::from_str(
            r#"
            connectInterval = "100ms"
            livenessInterval = "2s"
            "#,
        )
        .unwrap();

        assert_eq!(config.connect_interval, Duration::from_millis(100));
        assert_eq!(config.liveness_interval, Duration::from_secs(2));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: TransportConfig = toml::from_str(r#"connectInterval = "1s""#).unwrap();
        assert_eq!(config.connect_interval, Duration::from_secs(1));
        assert_eq!(config.liveness_interval, Duration::from_millis(1250));
    }
}
