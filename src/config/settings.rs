use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;

use crate::error::Result;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Outbound queue capacity per connection
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
    /// Heartbeat interval in seconds (server sends ping)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    /// Connection timeout in seconds (disconnect if no activity)
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Cleanup task interval in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    /// Range assigned to every new session
    #[serde(default = "default_range")]
    pub default_range: f64,
    /// Leave sessions without coordinates out of `users` snapshots
    #[serde(default)]
    pub hide_unlocated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_channel_buffer() -> usize {
    64
}

fn default_heartbeat_interval() -> u64 {
    30 // 30 seconds
}

fn default_connection_timeout() -> u64 {
    120 // 2 minutes
}

fn default_cleanup_interval() -> u64 {
    60 // 1 minute
}

fn default_range() -> f64 {
    1000.0
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Settings {
    pub fn new() -> Result<Self> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("websocket.channel_buffer", default_channel_buffer() as u64)?
            .set_default("websocket.heartbeat_interval", default_heartbeat_interval())?
            .set_default("websocket.connection_timeout", default_connection_timeout())?
            .set_default("websocket.cleanup_interval", default_cleanup_interval())?
            .set_default("presence.default_range", default_range())?
            .set_default("presence.hide_unlocated", false)?
            .set_default("log.format", "pretty")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // RELAY_SERVER__PORT, RELAY_PRESENCE__HIDE_UNLOCATED, ...
            .add_source(
                Environment::with_prefix("RELAY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            channel_buffer: default_channel_buffer(),
            heartbeat_interval: default_heartbeat_interval(),
            connection_timeout: default_connection_timeout(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            default_range: default_range(),
            hide_unlocated: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.server_addr(), "0.0.0.0:3000");
        assert_eq!(settings.presence.default_range, 1000.0);
        assert!(!settings.presence.hide_unlocated);
        assert_eq!(settings.log.format, LogFormat::Pretty);
    }

    #[test]
    fn test_partial_sections_fall_back_to_defaults() {
        let settings: Settings = serde_json::from_str(
            r#"{"server": {"port": 9000}, "presence": {"hide_unlocated": true}, "log": {"format": "json"}}"#,
        )
        .unwrap();

        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9000);
        assert!(settings.presence.hide_unlocated);
        assert_eq!(settings.presence.default_range, 1000.0);
        assert_eq!(settings.websocket.heartbeat_interval, 30);
        assert_eq!(settings.log.format, LogFormat::Json);
    }
}
