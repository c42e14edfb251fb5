//! Application configuration.
//!
//! ```toml
//! root_path = "/api"
//! debug = false
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! scheme = "http"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Mount prefix every route is reachable under. `None` or `/` for none.
    pub root_path: Option<String>,
    /// Send full error detail in failure bodies. Fixed for the app's lifetime.
    pub debug: bool,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Scheme reported by [`App::root_url`](crate::App::root_url). TLS
    /// itself is terminated in front of spur.
    pub scheme: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_path: None,
            debug: false,
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            scheme: "http".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, Error> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Applies `SPUR_DEBUG`, `SPUR_ROOT_PATH`, `SPUR_HOST` and `SPUR_PORT`
    /// from the process environment.
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Like [`with_env`](AppConfig::with_env), reading variables through `lookup`.
    /// Unparseable values are ignored.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(debug) = lookup("SPUR_DEBUG") {
            self.debug = matches!(debug.as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(root) = lookup("SPUR_ROOT_PATH") {
            self.root_path = Some(root);
        }
        if let Some(host) = lookup("SPUR_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SPUR_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str("root_path = \"/api\"\n[server]\nport = 9191\n");
        let config = config.ok();
        assert_eq!(config.as_ref().and_then(|c| c.root_path.as_deref()), Some("/api"));
        assert_eq!(config.as_ref().map(|c| c.server.port), Some(9191));
        assert_eq!(config.as_ref().map(|c| c.server.host.as_str()), Some("127.0.0.1"));
        assert_eq!(config.as_ref().map(|c| c.debug), Some(false));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(AppConfig::from_toml_str("debug = maybe"), Err(Error::Config(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(AppConfig::from_file("/nonexistent/spur.toml"), Err(Error::Io(_))));
    }

    #[test]
    fn env_overrides() {
        let config = AppConfig::default().with_env_from(|key| match key {
            "SPUR_DEBUG" => Some("true".into()),
            "SPUR_PORT" => Some("not-a-port".into()),
            "SPUR_ROOT_PATH" => Some("/mnt".into()),
            _ => None,
        });
        assert!(config.debug);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.root_path.as_deref(), Some("/mnt"));
    }
}
