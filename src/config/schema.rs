//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the connector.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::MagicCheck;

/// Root configuration for the AJP13 connector.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Protocol settings.
    pub ajp: AjpConfig,

    /// Stalled-processing detection.
    pub watchdog: WatchdogConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8009").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8009".to_string(),
            max_connections: 1_000,
        }
    }
}

/// AJP13 protocol settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AjpConfig {
    /// How long a fresh connection may stay silent before it is dropped,
    /// in milliseconds. `0` disables the timeout.
    pub idle_read_timeout_ms: u64,

    /// Magic byte policy for inbound packets.
    pub magic_check: MagicCheck,
}

impl AjpConfig {
    /// Idle timeout for the first packet, if enabled.
    pub fn idle_read_timeout(&self) -> Option<Duration> {
        (self.idle_read_timeout_ms > 0).then(|| Duration::from_millis(self.idle_read_timeout_ms))
    }
}

impl Default for AjpConfig {
    fn default() -> Self {
        Self {
            idle_read_timeout_ms: 60_000,
            magic_check: MagicCheck::Strict,
        }
    }
}

/// Watchdog configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Run the watchdog at all.
    pub enabled: bool,

    /// Sampling period in milliseconds.
    pub period_ms: u64,

    /// Processing time after which a request counts as exceeded, in milliseconds.
    pub max_processing_ms: u64,

    /// Restart the connector when every processing connection has exceeded.
    pub restart_on_deadlock: bool,
}

impl WatchdogConfig {
    /// Sampling period, never shorter than 1 ms.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.max(1))
    }

    pub fn max_processing_time(&self) -> Duration {
        Duration::from_millis(self.max_processing_ms)
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_ms: 30_000,
            max_processing_ms: 60_000,
            restart_on_deadlock: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: ConnectorConfig = toml::from_str("").unwrap();
        assert_eq!(config, ConnectorConfig::default());
        assert_eq!(config.ajp.idle_read_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn partial_tables() {
        let config: ConnectorConfig = toml::from_str(
            r#"
            [ajp]
            idle_read_timeout_ms = 0
            magic_check = "lenient"

            [watchdog]
            period_ms = 500
            restart_on_deadlock = true
            "#,
        )
        .unwrap();
        assert_eq!(config.ajp.idle_read_timeout(), None);
        assert_eq!(config.ajp.magic_check, MagicCheck::Lenient);
        assert_eq!(config.watchdog.period(), Duration::from_millis(500));
        assert_eq!(config.watchdog.max_processing_ms, 60_000);
        assert!(config.watchdog.restart_on_deadlock);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8009");
    }

    #[test]
    fn zero_period_is_clamped() {
        let config = WatchdogConfig {
            period_ms: 0,
            ..WatchdogConfig::default()
        };
        assert_eq!(config.period(), Duration::from_millis(1));
    }

    #[test]
    fn unknown_magic_check_is_rejected() {
        let result: Result<ConnectorConfig, _> = toml::from_str("[ajp]\nmagic_check = \"loose\"");
        assert!(result.is_err());
    }
}
