use std::fmt;

/// Represents the different types of errors that can occur while fitting or using a model.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// Error occurred while learning or applying the vocabulary
    VectorizerError(String),
    /// Error occurred while fitting the classifier
    ModelError(String),
    /// A transform or predict was attempted before fitting
    NotFitted(String),
    /// Error occurred while making predictions
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VectorizerError(msg) => write!(f, "Vectorizer error: {}", msg),
            Self::ModelError(msg) => write!(f, "Model error: {}", msg),
            Self::NotFitted(msg) => write!(f, "Not fitted: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}
