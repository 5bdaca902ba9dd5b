use crate::classifier::{ClassifierConfig, VectorizerConfig};
use crate::config::{ConfigError, TrainingConfig};

use super::TrainingPipeline;

/// A builder for constructing a TrainingPipeline with a fluent interface.
///
/// # Example
/// ```
/// use ods_classifier::PipelineBuilder;
///
/// let pipeline = PipelineBuilder::new()
///     .with_test_size(0.25)
///     .with_seed(7)
///     .build()
///     .unwrap();
/// assert_eq!(pipeline.config().random_state, 7);
/// ```
#[derive(Debug, Default, Clone)]
pub struct PipelineBuilder {
    config: TrainingConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every setting at once, e.g. with one read from a file
    pub fn with_config(mut self, config: TrainingConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the fraction of examples held out for evaluation
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.config.test_size = test_size;
        self
    }

    /// Sets the seed for the train/test shuffle
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.random_state = seed;
        self
    }

    pub fn with_vectorizer_config(mut self, config: VectorizerConfig) -> Self {
        self.config.vectorizer = config;
        self
    }

    pub fn with_classifier_config(mut self, config: ClassifierConfig) -> Self {
        self.config.classifier = config;
        self
    }

    /// Validates the settings and builds the pipeline
    pub fn build(self) -> Result<TrainingPipeline, ConfigError> {
        self.config.validate()?;
        Ok(TrainingPipeline { config: self.config })
    }
}
