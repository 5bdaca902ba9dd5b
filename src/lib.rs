//! Text classification behind two operations: `predict` labels new texts
//! with the current model, `retrain` replaces that model with one fit on a
//! freshly supplied dataset.
//!
//! The model is a TF-IDF vectorizer paired with a class-weighted
//! multinomial logistic regression. Retraining splits the data, fits both
//! halves on the training part, persists the pair and reports metrics on
//! the held-out part.
//!
//! ```
//! use ods_classifier::{ClassificationService, Label, MemoryModelStore, RetrainOutcome};
//!
//! let service = ClassificationService::new(MemoryModelStore::new());
//! let texts = ["good service", "bad service", "great support", "terrible support"];
//! let labels: Vec<Label> = ["1", "0", "1", "0"].into_iter().map(Label::from).collect();
//!
//! match service.retrain(&texts, &labels).unwrap() {
//!     RetrainOutcome::Trained(summary) => assert_eq!(summary.train_size, 3),
//!     RetrainOutcome::InsufficientExamples { .. } => unreachable!(),
//! }
//! let predictions = service.predict(&["good service"]).unwrap();
//! assert_eq!(predictions.len(), 1);
//! ```

pub mod classifier;
pub mod config;
pub mod model_store;
pub mod pipeline;
pub mod server;
pub mod service;

pub use classifier::{
    ClassWeight, ClassifierConfig, ClassifierError, FeatureVector, Label, LabelKind, LogisticRegression, Model,
    ModelInfo, Prediction, TfidfVectorizer, VectorizerConfig,
};
pub use config::{ConfigError, ServerConfig, TrainingConfig};
pub use model_store::{FileModelStore, MemoryModelStore, ModelStore, StoreError};
pub use pipeline::{
    EvaluationReport, PipelineBuilder, PipelineError, RetrainOutcome, TrainingPipeline, TrainingSummary,
};
pub use service::{ClassificationService, HealthStatus, ServiceError};

pub fn init_logger() {
    env_logger::init();
}
