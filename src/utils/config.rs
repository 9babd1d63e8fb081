//! Configuration management
//!
//! Application settings live in a TOML file with three tables: `[model]`,
//! `[runtime]` and `[logging]`. Missing keys fall back to defaults.

use crate::error::{Error, Result};
use crate::model::ModelConfig;
use crate::training::RunControl;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Seed and time limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Seed for weight initialisation and dropout
    pub seed: u64,
    /// Optional wall-clock budget for a single predict or train call
    pub time_budget_ms: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            time_budget_ms: None,
        }
    }
}

impl RuntimeConfig {
    /// Run limits derived from the time budget
    pub fn run_control(&self) -> RunControl {
        match self.time_budget_ms {
            Some(ms) => RunControl::new().with_time_budget(Duration::from_millis(ms)),
            None => RunControl::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.model.validate()?;
        Ok(config)
    }

    /// Load configuration from file or use default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Optimizer;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.model = ModelConfig::small(20).with_optimizer(Optimizer::Sgd);
        config.runtime.time_budget_ms = Some(250);
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[model]\nhidden_size = 32\n\n[runtime]\nseed = 7\n").unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.model.hidden_size, 32);
        assert_eq!(loaded.model.input_size, ModelConfig::default().input_size);
        assert_eq!(loaded.runtime.seed, 7);
        assert_eq!(loaded.runtime.time_budget_ms, None);
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn test_training_schedule_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedule.toml");
        std::fs::write(
            &path,
            "[model]\nearly_stopping_patience = 10\n\n[model.lr_plateau]\npatience = 3\n",
        )
        .unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.model.early_stopping_patience, Some(10));
        let plateau = loaded.model.lr_plateau.unwrap();
        assert_eq!(plateau.patience, 3);
        assert_eq!(plateau.factor, 0.2);
        assert_eq!(plateau.min_lr, 0.0001);
    }

    #[test]
    fn test_invalid_model_section_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[model]\ndropout = 1.5\n").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[model\n").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(Error::Config(_))));
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
    }

    #[test]
    fn test_zero_budget_times_out() {
        let runtime = RuntimeConfig {
            seed: 1,
            time_budget_ms: Some(0),
        };
        assert!(matches!(runtime.run_control().check(), Err(Error::Timeout)));
        assert!(RuntimeConfig::default().run_control().check().is_ok());
    }
}
