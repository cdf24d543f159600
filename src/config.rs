//! Configuration — generation and analysis settings loaded from ~/.backbeat/config.yaml.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::groove::DEFAULT_STYLE;
use crate::perform::PerformanceParams;

/// Top-level configuration. Every field has a default; a partial file is fine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackbeatConfig {
    pub generation: GenerationConfig,
    pub analysis: AnalysisConfig,
}

/// Settings for the performance engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Style used when a requested style has no template.
    pub default_style: String,
    /// Thin late-bar hats at phrase ends. Off by default.
    pub phrase_end_dropout: bool,
    /// Probability of dropping a non-main hat hit while a lead motif plays.
    pub lead_duck_factor: f64,
    pub params: PerformanceParams,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_style: DEFAULT_STYLE.to_string(),
            phrase_end_dropout: false,
            lead_duck_factor: 0.5,
            params: PerformanceParams::default(),
        }
    }
}

/// Settings for feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Grid slots per bar for fingerprints and the matrix.
    pub grid_resolution: u32,
    /// Minimum Jaccard similarity for two bars to share a family.
    pub similarity_threshold: f64,
    /// Allowed rise in similarity to the base bar inside an evolving sequence.
    pub sequence_tolerance: f64,
    /// Width of a timing histogram bucket, in ticks.
    pub timing_histogram_bucket: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            grid_resolution: 16,
            similarity_threshold: 0.7,
            sequence_tolerance: 0.05,
            timing_histogram_bucket: 5,
        }
    }
}

impl BackbeatConfig {
    /// Standard location: `~/.backbeat/config.yaml`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".backbeat")
            .join("config.yaml")
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::invalid(format!("config: {e}")))
    }

    /// Load a config file. Errors if it is missing or unreadable.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from the standard path, falling back to defaults.
    pub fn load_or_default() -> Self {
        let path = Self::default_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("ignoring {}: {e}", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = BackbeatConfig::default();
        assert_eq!(config.generation.default_style, "Basic");
        assert!(!config.generation.phrase_end_dropout);
        assert_eq!(config.analysis.grid_resolution, 16);
        assert_eq!(config.analysis.similarity_threshold, 0.7);
    }

    #[test]
    fn partial_yaml() {
        let yaml = r#"
generation:
  default_style: Rock
  params:
    fill_probability: 0.2
analysis:
  grid_resolution: 32
"#;
        let config = BackbeatConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.generation.default_style, "Rock");
        assert_eq!(config.generation.params.fill_probability, 0.2);
        assert_eq!(config.generation.params.density_multiplier, 1.0);
        assert_eq!(config.generation.lead_duck_factor, 0.5);
        assert_eq!(config.analysis.grid_resolution, 32);
        assert_eq!(config.analysis.sequence_tolerance, 0.05);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "generation:\n  phrase_end_dropout: true").unwrap();
        let config = BackbeatConfig::load(file.path()).unwrap();
        assert!(config.generation.phrase_end_dropout);
    }

    #[test]
    fn load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BackbeatConfig::load(&dir.path().join("nope.yaml")).is_err());
    }

    #[test]
    fn malformed_yaml_errors() {
        assert!(BackbeatConfig::from_yaml("generation: [1, 2").is_err());
    }

    #[test]
    fn load_or_default_does_not_panic() {
        let _ = BackbeatConfig::load_or_default();
    }
}
