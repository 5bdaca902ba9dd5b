//! Split, fit, persist and evaluate.

use log::info;
use serde::Serialize;

use crate::classifier::{
    ClassifierError, Label, LabelKind, LogisticRegression, Model, ModelInfo, TfidfVectorizer,
};
use crate::config::{ConfigError, TrainingConfig};
use crate::model_store::{ModelStore, StoreError};

mod builder;
pub mod metrics;
pub mod split;

pub use builder::PipelineBuilder;
pub use metrics::{evaluate, ClassScores, ClassificationReport, EvaluationReport, RESERVED_REPORT_KEYS};
pub use split::{Split, SplitError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    Input(String),
    #[error("Training failed: {0}")]
    Training(#[from] ClassifierError),
    #[error("Could not persist model: {0}")]
    Persistence(#[source] StoreError),
    #[error("Could not split dataset: {0}")]
    Split(#[from] SplitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What a successful retrain reports back.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    /// Scores on the held-out split
    pub report: EvaluationReport,
    pub train_size: usize,
    pub test_size: usize,
    pub model_info: ModelInfo,
    /// False when the split fell back to a plain shuffle
    pub stratified: bool,
}

#[derive(Debug, Clone)]
pub enum RetrainOutcome {
    /// Fewer than two examples; nothing was trained or written.
    InsufficientExamples { received: usize },
    Trained(TrainingSummary),
}

/// Builds a fresh model from a labeled dataset and makes it the current one.
#[derive(Debug, Clone, Default)]
pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Result<Self, PipelineError> {
        Ok(PipelineBuilder::new().with_config(config).build()?)
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Refits vectorizer and classifier from scratch, saves the pair to
    /// `store`, then evaluates it on the held-out split.
    ///
    /// The model is persisted before evaluation, so a successful return
    /// always means `store` holds the model the metrics describe.
    pub fn retrain<S, T>(&self, store: &S, texts: &[T], labels: &[Label]) -> Result<RetrainOutcome, PipelineError>
    where
        S: ModelStore + ?Sized,
        T: AsRef<str>,
    {
        if texts.len() != labels.len() {
            return Err(PipelineError::Input(format!(
                "Got {} texts but {} labels",
                texts.len(),
                labels.len()
            )));
        }
        if texts.len() < 2 {
            info!("Retrain skipped: {} example(s) is not enough to split", texts.len());
            return Ok(RetrainOutcome::InsufficientExamples { received: texts.len() });
        }
        let label_kind = Label::common_kind(labels)
            .map_err(|e| PipelineError::Input(e.to_string()))?
            .unwrap_or(LabelKind::Text);
        let canonical: Vec<String> = labels.iter().map(Label::canonical).collect();
        if let Some(reserved) = canonical.iter().find(|l| RESERVED_REPORT_KEYS.contains(&l.as_str())) {
            return Err(PipelineError::Input(format!(
                "Label '{}' is reserved for a summary row of the classification report",
                reserved
            )));
        }

        if store.has_model() {
            info!("Replacing current model");
        } else {
            info!("No current model; training the first one");
        }

        let config = &self.config;
        let split = split::train_test_split(&canonical, config.test_size, config.random_state)?;
        let pick_texts = |indices: &[usize]| indices.iter().map(|&i| texts[i].as_ref()).collect::<Vec<&str>>();
        let pick_labels = |indices: &[usize]| indices.iter().map(|&i| canonical[i].clone()).collect::<Vec<String>>();
        let (train_texts, train_labels) = (pick_texts(&split.train), pick_labels(&split.train));
        let (test_texts, test_labels) = (pick_texts(&split.test), pick_labels(&split.test));
        info!(
            "Training on {} examples, evaluating on {} ({})",
            train_texts.len(),
            test_texts.len(),
            if split.stratified { "stratified" } else { "random split" }
        );

        let mut vectorizer = TfidfVectorizer::new(config.vectorizer.clone());
        let train_features = vectorizer.fit_transform(&train_texts)?;
        let mut classifier = LogisticRegression::new(config.classifier.clone());
        classifier.fit(&train_features, &train_labels)?;
        let model = Model::new(vectorizer, classifier, label_kind)?;

        store.save(&model).map_err(PipelineError::Persistence)?;

        let test_features = model.vectorizer().transform(&test_texts)?;
        let predictions = model.classifier().predict(&test_features)?;
        let report = evaluate(&test_labels, &predictions);
        info!(
            "Held-out accuracy {:.4}, macro F1 {:.4}",
            report.accuracy, report.f1_macro
        );

        Ok(RetrainOutcome::Trained(TrainingSummary {
            report,
            train_size: train_texts.len(),
            test_size: test_texts.len(),
            model_info: model.info(),
            stratified: split.stratified,
        }))
    }
}
