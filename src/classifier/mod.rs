use serde::Serialize;

mod error;
mod label;
mod lbfgs;
mod logistic;
mod model;
mod utils;
pub mod vectorizer;

pub use error::ClassifierError;
pub use label::{Label, LabelKind};
pub use logistic::{ClassWeight, ClassifierConfig, LogisticRegression};
pub use model::{Model, Prediction};
pub use vectorizer::{FeatureVector, TfidfVectorizer, VectorizerConfig};

/// Information about the current state of a fitted model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    /// Number of classes the classifier was trained on
    pub num_classes: usize,
    /// Labels of the classes, in canonical form
    pub class_labels: Vec<String>,
    /// Number of terms in the learned vocabulary
    pub vocabulary_size: usize,
    /// Whether labels are returned as text or integers
    pub label_kind: LabelKind,
    /// Solver iterations used during the last fit
    pub n_iter: usize,
    /// False when the solver stopped at its iteration cap
    pub converged: bool,
}
