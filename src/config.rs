use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifierConfig, VectorizerConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cannot parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Everything that shapes a retrain: split, vectorizer and classifier settings.
///
/// All fields have defaults, so a config file only needs the keys it changes:
///
/// ```json
/// { "test_size": 0.25, "classifier": { "max_iter": 500 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of the dataset held out for evaluation
    pub test_size: f64,
    /// Seed for the train/test shuffle
    pub random_state: u64,
    pub vectorizer: VectorizerConfig,
    pub classifier: ClassifierConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            vectorizer: VectorizerConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Reads and validates a JSON config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }

        let v = &self.vectorizer;
        let (min_n, max_n) = v.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(ConfigError::Invalid(format!(
                "ngram_range must satisfy 1 <= min <= max, got ({}, {})",
                min_n, max_n
            )));
        }
        if v.min_df == 0 {
            return Err(ConfigError::Invalid("min_df must be at least 1".into()));
        }
        if !(v.max_df > 0.0 && v.max_df <= 1.0) {
            return Err(ConfigError::Invalid(format!("max_df must be in (0, 1], got {}", v.max_df)));
        }

        let c = &self.classifier;
        if !(c.c > 0.0) {
            return Err(ConfigError::Invalid(format!("C must be positive, got {}", c.c)));
        }
        if c.max_iter == 0 {
            return Err(ConfigError::Invalid("max_iter must be at least 1".into()));
        }
        if !(c.tol > 0.0) {
            return Err(ConfigError::Invalid(format!("tol must be positive, got {}", c.tol)));
        }
        if c.history == 0 {
            return Err(ConfigError::Invalid("history must be at least 1".into()));
        }
        Ok(())
    }
}

/// Settings for the HTTP transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `127.0.0.1:8000`
    pub addr: String,
    /// Origins that receive CORS headers
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
                "http://localhost:5174".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrainingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.vectorizer.ngram_range, (1, 2));
        assert_eq!(config.vectorizer.min_df, 3);
        assert_eq!(config.classifier.max_iter, 2000);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "test_size": 0.25, "classifier": {{ "max_iter": 500 }} }}"#).unwrap();

        let config = TrainingConfig::from_file(file.path()).unwrap();
        assert_eq!(config.test_size, 0.25);
        assert_eq!(config.classifier.max_iter, 500);
        assert_eq!(config.classifier.c, 1.0);
        assert_eq!(config.random_state, 42);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = TrainingConfig::default();
        config.test_size = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = TrainingConfig::default();
        config.vectorizer.ngram_range = (2, 1);
        assert!(config.validate().is_err());

        let mut config = TrainingConfig::default();
        config.classifier.c = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = TrainingConfig::from_file("/nonexistent/ods-classifier.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
