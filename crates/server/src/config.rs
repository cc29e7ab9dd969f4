//! Engine configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "models_dir": "artifacts", "fold_in": { "n_epochs": 100, "learning_rate": 0.01 } }
//! ```

use anyhow::{Context, Result};
use data_loader::RatingScale;
use pipeline::FoldInConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the catalog and ratings files
    pub data_dir: PathBuf,
    /// Directory holding the optimized factor artifacts
    pub models_dir: PathBuf,
    /// Trained model used when the optimized artifacts are missing
    pub legacy_model: PathBuf,
    pub scale: RatingScale,
    /// Rebuild chunked artifacts under `models_dir` before loading
    pub materialize_chunks: bool,
    pub fold_in: FoldInConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/ml-latest-small"),
            models_dir: PathBuf::from("models"),
            legacy_model: PathBuf::from("models/svd_model.json"),
            scale: RatingScale::default(),
            materialize_chunks: true,
            fold_in: FoldInConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scale.validate().context("Invalid rating scale")?;
        self.fold_in.validate().context("Invalid fold-in settings")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(
            &path,
            r#"{"models_dir": "artifacts", "fold_in": {"n_epochs": 100}}"#,
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.models_dir, PathBuf::from("artifacts"));
        assert_eq!(config.fold_in.n_epochs, 100);
        assert_eq!(config.fold_in.learning_rate, 0.005);
        assert_eq!(config.scale, RatingScale::default());
        assert!(config.materialize_chunks);
    }

    #[test]
    fn test_invalid_scale_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"scale": {"min": 5.0, "max": 1.0}}"#).unwrap();

        assert!(EngineConfig::from_file(&path).is_err());
    }
}
