//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `GEOTRACKD_LISTEN`, `GEOTRACKD_GPSD`
//! 2. **Config file** — path via `--config <path>`, or `geotrackd.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8094"
//!
//! # Omit entirely on hosts without position sensing — the tracker then
//! # reports the fixed not-supported error and never starts a watch.
//! [source]
//! kind = "gpsd"            # "gpsd" or "constant"
//! host = "127.0.0.1"       # gpsd only
//! port = 2947              # gpsd only
//! latitude = 45.502        # constant only
//! longitude = -73.567      # constant only
//! interval_ms = 1000       # constant only
//!
//! [logging]
//! level = "info"
//! ```

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Optional position source. Absent means the host cannot sense position.
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:8094`).
    #[serde(default = "default_listen")]
    pub listen: String,
}

/// Which position source backs the watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Gpsd,
    Constant,
}

/// Position source settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// gpsd host (default `127.0.0.1`).
    #[serde(default = "default_gpsd_host")]
    pub host: String,
    /// gpsd port (default 2947).
    #[serde(default = "default_gpsd_port")]
    pub port: u16,
    /// Fixed latitude for the constant source.
    #[serde(default)]
    pub latitude: f64,
    /// Fixed longitude for the constant source.
    #[serde(default)]
    pub longitude: f64,
    /// Emit cadence for the constant source, milliseconds (default 1000).
    #[serde(default = "default_constant_interval_ms")]
    pub interval_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:8094".to_string()
}
fn default_gpsd_host() -> String {
    "127.0.0.1".to_string()
}
fn default_gpsd_port() -> u16 {
    2947
}
fn default_constant_interval_ms() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, reads that file (panics on failure). Otherwise
    /// looks for `geotrackd.toml` in the current directory, falling back to
    /// compiled defaults.
    pub fn load(path: Option<&str>) -> Self {
        let mut config = if let Some(p) = path {
            let content = std::fs::read_to_string(p)
                .unwrap_or_else(|e| panic!("Failed to read config file {p}: {e}"));
            toml::from_str(&content)
                .unwrap_or_else(|e| panic!("Failed to parse config file {p}: {e}"))
        } else if Path::new("geotrackd.toml").exists() {
            let content =
                std::fs::read_to_string("geotrackd.toml").expect("Failed to read geotrackd.toml");
            toml::from_str(&content).expect("Failed to parse geotrackd.toml")
        } else {
            Config {
                server: ServerConfig::default(),
                source: None,
                logging: LoggingConfig::default(),
            }
        };

        // Env var overrides
        if let Ok(listen) = std::env::var("GEOTRACKD_LISTEN") {
            config.server.listen = listen;
        }
        if let Ok(gpsd) = std::env::var("GEOTRACKD_GPSD") {
            let (host, port) = match gpsd.rsplit_once(':') {
                Some((h, p)) => (h.to_string(), p.parse().unwrap_or_else(|_| default_gpsd_port())),
                None => (gpsd.clone(), default_gpsd_port()),
            };
            let source = config.source.get_or_insert(SourceConfig {
                kind: SourceKind::Gpsd,
                host: default_gpsd_host(),
                port: default_gpsd_port(),
                latitude: 0.0,
                longitude: 0.0,
                interval_ms: default_constant_interval_ms(),
            });
            source.kind = SourceKind::Gpsd;
            source.host = host;
            source.port = port;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gpsd_source() {
        let config: Config = toml::from_str(
            r#"
            [server]
            listen = "127.0.0.1:9000"

            [source]
            kind = "gpsd"
            host = "10.0.0.5"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        let source = config.source.unwrap();
        assert_eq!(source.kind, SourceKind::Gpsd);
        assert_eq!(source.host, "10.0.0.5");
        assert_eq!(source.port, 2947);
    }

    #[test]
    fn missing_source_section_means_capability_absent() {
        let config: Config = toml::from_str("[server]\nlisten = \"0.0.0.0:8094\"\n").unwrap();
        assert!(config.source.is_none());
    }

    #[test]
    fn parses_constant_source() {
        let config: Config = toml::from_str(
            r#"
            [source]
            kind = "constant"
            latitude = 45.502
            longitude = -73.567
            "#,
        )
        .unwrap();
        let source = config.source.unwrap();
        assert_eq!(source.kind, SourceKind::Constant);
        assert!((source.latitude - 45.502).abs() < 1e-9);
        assert_eq!(source.interval_ms, 1000);
    }
}
