use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::SessionMode;

/// Environment variable overriding the configured backend URL
pub const BACKEND_URL_ENV: &str = "RECIPE_BACKEND_URL";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the extraction backend
    pub backend_url: String,
    /// Path of the single request/response endpoint
    pub extract_path: String,
    /// Path of the incremental event-stream endpoint
    pub stream_path: String,
    /// Connect timeout for the HTTP client (None = transport default)
    pub connect_timeout_secs: Option<u64>,
    /// Mode used when the caller does not pick one
    pub default_mode: SessionMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:3000".to_string(),
            extract_path: "/extract".to_string(),
            stream_path: "/extract/stream".to_string(),
            connect_timeout_secs: None,
            default_mode: SessionMode::Streaming,
        }
    }
}

impl Config {
    /// Default settings file (~/.config/recipe-stream/settings.json)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recipe-stream")
            .join("settings.json")
    }

    /// Load settings from `path`, falling back to defaults if it does not exist.
    /// The backend URL environment variable wins over the file.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings file {:?}", path))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid settings file {:?}", path))?
        } else {
            tracing::debug!("No settings file at {:?}, using defaults", path);
            Self::default()
        };

        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.is_empty() {
                config.backend_url = url;
            }
        }

        Ok(config)
    }

    /// Load from the default location, or defaults if that fails
    pub fn load_or_default() -> Self {
        let path = Self::default_path();
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load settings: {:#}", e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    pub fn extract_url(&self) -> String {
        join_url(&self.backend_url, &self.extract_path)
    }

    pub fn stream_url(&self) -> String {
        join_url(&self.backend_url, &self.stream_path)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_join_cleanly() {
        let config = Config {
            backend_url: "http://example.test:8080/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.extract_url(), "http://example.test:8080/extract");
        assert_eq!(config.stream_url(), "http://example.test:8080/extract/stream");
    }

    #[test]
    fn test_save_and_load_partial_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("settings.json");

        let config = Config {
            stream_path: "/sse".to_string(),
            connect_timeout_secs: Some(5),
            default_mode: SessionMode::Regular,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.stream_path, "/sse");
        assert_eq!(loaded.connect_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(loaded.default_mode, SessionMode::Regular);

        // Missing keys take their defaults.
        std::fs::write(&path, r#"{"extract_path":"/api/extract"}"#).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.extract_path, "/api/extract");
        assert_eq!(loaded.stream_path, "/extract/stream");
    }

    #[test]
    fn test_missing_file_uses_defaults_and_bad_file_errors() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("absent.json");
        let loaded = Config::load(&missing).unwrap();
        assert_eq!(loaded.extract_path, Config::default().extract_path);

        let bad = temp_dir.path().join("bad.json");
        std::fs::write(&bad, "{ nope").unwrap();
        assert!(Config::load(&bad).is_err());
    }

    #[test]
    fn test_env_overrides_file_unless_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("settings.json");
        Config {
            backend_url: "http://file.test:3000".to_string(),
            ..Default::default()
        }
        .save(&path)
        .unwrap();

        let previous = std::env::var(BACKEND_URL_ENV).ok();

        std::env::set_var(BACKEND_URL_ENV, "http://env.test:4000");
        let from_env = Config::load(&path).unwrap().backend_url;

        std::env::set_var(BACKEND_URL_ENV, "");
        let with_empty = Config::load(&path).unwrap().backend_url;

        match previous {
            Some(value) => std::env::set_var(BACKEND_URL_ENV, value),
            None => std::env::remove_var(BACKEND_URL_ENV),
        }

        assert_eq!(from_env, "http://env.test:4000");
        assert_eq!(with_empty, "http://file.test:3000");
    }
}
