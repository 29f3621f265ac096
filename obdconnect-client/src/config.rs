use crate::retry::RetryPolicy;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default ELM327 WiFi adapter port
pub const DEFAULT_PORT: u16 = 35000;

/// Configurable log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
        }
    }
}

/// Connection and pacing settings for one adapter session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// IP address or host name of the adapter
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 0 waits for the OS connect timeout
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Longest a single read blocks; 0 blocks indefinitely
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Pause after connecting before the first command
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Pause after each send before reading the reply
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
    /// Upper bound on the bytes taken by one read
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// Pause before re-sending a PID query whose reply did not decode
    #[serde(default = "default_decode_retry_delay_ms")]
    pub decode_retry_delay_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_host() -> String {
    "192.168.0.10".to_string()
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

const fn default_connect_timeout_ms() -> u64 {
    5000
}

const fn default_read_timeout_ms() -> u64 {
    5000
}

const fn default_settle_delay_ms() -> u64 {
    1000
}

const fn default_send_delay_ms() -> u64 {
    200
}

const fn default_read_buffer_size() -> usize {
    1024
}

const fn default_decode_retry_delay_ms() -> u64 {
    100
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            send_delay_ms: default_send_delay_ms(),
            read_buffer_size: default_read_buffer_size(),
            decode_retry_delay_ms: default_decode_retry_delay_ms(),
            retry: RetryPolicy::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Format the adapter address as `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    pub fn decode_retry_delay(&self) -> Duration {
        Duration::from_millis(self.decode_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = ClientConfig::from_json("{}").unwrap();
        assert_eq!(config.host, "192.168.0.10");
        assert_eq!(config.port, 35000);
        assert_eq!(config.send_delay(), Duration::from_millis(200));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_partial_override() {
        let config = ClientConfig::from_json(
            r#"{"host": "10.0.0.5", "send_delay_ms": 50, "log_level": "debug", "retry": {"max_attempts": 3}}"#,
        )
        .unwrap();
        assert_eq!(config.addr(), "10.0.0.5:35000");
        assert_eq!(config.send_delay(), Duration::from_millis(50));
        assert_eq!(config.log_level.as_level_filter(), LevelFilter::Debug);
        assert_eq!(config.retry.max_attempts, Some(3));
        assert_eq!(
            config.retry.retry_delay_ms,
            RetryPolicy::default().retry_delay_ms
        );
    }

    #[test]
    fn test_unbounded_retry_opt_in() {
        let config = ClientConfig::from_json(r#"{"retry": {"max_attempts": null}}"#).unwrap();
        assert_eq!(config.retry, RetryPolicy::unbounded());
    }

    #[test]
    fn test_zero_timeouts_disable() {
        let config = ClientConfig {
            connect_timeout_ms: 0,
            read_timeout_ms: 0,
            ..ClientConfig::default()
        };
        assert_eq!(config.connect_timeout(), None);
        assert_eq!(config.read_timeout(), None);
    }

    #[test]
    fn test_round_trip_json() {
        let config = ClientConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed = ClientConfig::from_json(&json).unwrap();
        assert_eq!(parsed.addr(), config.addr());
        assert_eq!(parsed.retry, config.retry);
    }
}
