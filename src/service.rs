use log::{debug, info};
use serde::Serialize;

use crate::classifier::{ClassifierError, Label, Prediction};
use crate::model_store::{ModelStore, StoreError};
use crate::pipeline::{PipelineError, RetrainOutcome, TrainingPipeline};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    Input(String),
    #[error("Model not found: {0}")]
    ModelNotFound(String),
    #[error("Could not load model: {0}")]
    Persistence(#[source] StoreError),
    #[error("Prediction failed: {0}")]
    Prediction(#[from] ClassifierError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(detail) => Self::ModelNotFound(detail),
            other => Self::Persistence(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    /// `"ok"` when the current model loads, `"error"` otherwise
    pub status: String,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The two public operations, `predict` and `retrain`, over one model store.
///
/// `predict` reads whatever model the store currently holds; it never
/// caches, so a retrain through any handle on the same store is visible to
/// the next call.
#[derive(Debug)]
pub struct ClassificationService<S: ModelStore> {
    store: S,
    pipeline: TrainingPipeline,
}

impl<S: ModelStore> ClassificationService<S> {
    pub fn new(store: S) -> Self {
        Self::with_pipeline(store, TrainingPipeline::default())
    }

    pub fn with_pipeline(store: S, pipeline: TrainingPipeline) -> Self {
        Self { store, pipeline }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn pipeline(&self) -> &TrainingPipeline {
        &self.pipeline
    }

    /// Labels every text with the current model, in input order.
    pub fn predict<T: AsRef<str>>(&self, texts: &[T]) -> Result<Vec<Prediction>, ServiceError> {
        let model = self.store.load()?;
        debug!("Predicting {} text(s)", texts.len());
        Ok(model.predict_with_scores(texts)?)
    }

    pub fn retrain<T: AsRef<str>>(&self, texts: &[T], labels: &[Label]) -> Result<RetrainOutcome, ServiceError> {
        let outcome = self.pipeline.retrain(&self.store, texts, labels).map_err(|e| match e {
            PipelineError::Input(detail) => ServiceError::Input(detail),
            other => ServiceError::Pipeline(other),
        })?;
        if let RetrainOutcome::Trained(summary) = &outcome {
            info!(
                "Retrained on {} examples ({} classes)",
                summary.train_size + summary.test_size,
                summary.model_info.num_classes
            );
        }
        Ok(outcome)
    }

    /// Reports whether a model can be loaded. Never fails.
    pub fn health(&self) -> HealthStatus {
        match self.store.load() {
            Ok(_) => HealthStatus {
                status: "ok".to_string(),
                model_loaded: true,
                detail: None,
            },
            Err(e) => HealthStatus {
                status: "error".to_string(),
                model_loaded: false,
                detail: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_store::MemoryModelStore;

    #[test]
    fn test_predict_without_model() {
        let service = ClassificationService::new(MemoryModelStore::new());
        let result = service.predict(&["good service"]);
        assert!(matches!(result, Err(ServiceError::ModelNotFound(_))));
    }

    #[test]
    fn test_health_reports_missing_model() {
        let service = ClassificationService::new(MemoryModelStore::new());
        let health = service.health();
        assert_eq!(health.status, "error");
        assert!(!health.model_loaded);
        assert!(health.detail.is_some());
    }

    #[test]
    fn test_retrain_then_predict() {
        let service = ClassificationService::new(MemoryModelStore::new());
        let texts = ["good service", "bad service", "great support", "terrible support"];
        let labels: Vec<Label> = ["1", "0", "1", "0"].iter().map(|&l| Label::from(l)).collect();

        let outcome = service.retrain(&texts, &labels).unwrap();
        assert!(matches!(outcome, RetrainOutcome::Trained(_)));
        assert!(service.health().model_loaded);

        let predictions = service.predict(&["good service", "something else"]).unwrap();
        assert_eq!(predictions.len(), 2);
        for prediction in &predictions {
            assert!(prediction.label == Label::from("1") || prediction.label == Label::from("0"));
        }
    }
}
