//! Configuration module for pulsewatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "pulsewatch.db")
    pub db_path: String,
    /// Seconds between overdue-probe sweeps (default: 60)
    pub sweep_interval_secs: u64,
    /// Webhook URL for event notifications (default: none)
    pub webhook_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "pulsewatch.db".to_string(),
            sweep_interval_secs: 60,
            webhook_url: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PULSEWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `PULSEWATCH_DB_PATH`: Database file path (default: "pulsewatch.db")
    /// - `PULSEWATCH_SWEEP_INTERVAL_SECS`: sweep period (default: 60)
    /// - `PULSEWATCH_WEBHOOK_URL`: event notification sink (default: unset)
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("PULSEWATCH_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(db_path) = env::var("PULSEWATCH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(interval_str) = env::var("PULSEWATCH_SWEEP_INTERVAL_SECS") {
            if let Ok(interval) = interval_str.parse() {
                cfg.sweep_interval_secs = interval;
            }
        }

        if let Ok(url) = env::var("PULSEWATCH_WEBHOOK_URL") {
            if !url.is_empty() {
                cfg.webhook_url = Some(url);
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "pulsewatch.db");
        assert_eq!(cfg.sweep_interval_secs, 60);
        assert!(cfg.webhook_url.is_none());
    }
}
