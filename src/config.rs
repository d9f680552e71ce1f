// src/config.rs

use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CONFIG_PATH_ENV: &str = "PLAYER_DETECTION_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {path}"))?;
        Self::from_yaml(&contents).with_context(|| format!("Invalid config {path}"))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// Loads from `$PLAYER_DETECTION_CONFIG` (or `config.yaml`), falling back
    /// to defaults when the file does not exist. A malformed file is an error.
    pub fn load_or_default() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        if !Path::new(&path).exists() {
            warn!("Config file {} not found, using defaults", path);
            return Ok(Self::default());
        }

        Self::load(&path)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.video
            .temp_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.model.path, "models/best.onnx");
        assert_eq!(
            config.model.class_names,
            vec!["ball", "goalkeeper", "player", "referee"]
        );
        assert_eq!(config.video.fourcc, "mp4v");
        assert_eq!(config.video.fallback_fps, 30.0);
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.logging.level, "info");
        assert!(!config.inference.use_cuda);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "model:\n  path: weights/pitch.onnx\nserver:\n  port: 9000\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.model.path, "weights/pitch.onnx");
        assert_eq!(config.model.class_names.len(), 4);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
    }

    #[test]
    fn test_empty_yaml() {
        let config = Config::from_yaml("  \n").unwrap();
        assert_eq!(config.inference.num_threads, 4);
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        assert!(Config::from_yaml("server: [unclosed").is_err());
        assert!(Config::from_yaml("server:\n  port: not-a-number\n").is_err());
    }

    #[test]
    fn test_temp_dir_override() {
        let config = Config::from_yaml("video:\n  temp_dir: /var/tmp/pd\n").unwrap();
        assert_eq!(config.temp_dir(), PathBuf::from("/var/tmp/pd"));
        assert_eq!(Config::default().temp_dir(), std::env::temp_dir());
    }

    #[test]
    fn test_load_missing_file_is_error() {
        assert!(Config::load("/nonexistent/player-detection.yaml").is_err());
    }
}
