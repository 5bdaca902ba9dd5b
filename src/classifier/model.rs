use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::label::{Label, LabelKind};
use super::logistic::LogisticRegression;
use super::utils::argmax;
use super::vectorizer::TfidfVectorizer;

/// A single scored prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: Label,
    /// Probability of `label`
    pub probability: f64,
    /// Probability of every known class, keyed by canonical label
    pub scores: BTreeMap<String, f64>,
}

/// A fitted vectorizer together with the classifier trained on its output.
///
/// This pair is the unit of inference and of persistence: the classifier's
/// weights only make sense against the vocabulary of the vectorizer it was
/// fit downstream of, so the two are never swapped independently.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use ods_classifier::{FileModelStore, ModelStore};
///
/// let store = FileModelStore::new_default()?;
/// let model = store.load()?;
/// let labels = model.predict(&["good service"])?;
/// println!("Predicted: {}", labels[0]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    vectorizer: TfidfVectorizer,
    classifier: LogisticRegression,
    label_kind: LabelKind,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<Model>;
};

impl Model {
    /// Pairs a fitted vectorizer with a classifier fit on its vectors.
    pub fn new(
        vectorizer: TfidfVectorizer,
        classifier: LogisticRegression,
        label_kind: LabelKind,
    ) -> Result<Self, ClassifierError> {
        if !vectorizer.is_fitted() {
            return Err(ClassifierError::NotFitted("Vectorizer has not been fit".into()));
        }
        if !classifier.is_fitted() {
            return Err(ClassifierError::NotFitted("Classifier has not been fit".into()));
        }
        if classifier.n_features() != vectorizer.vocabulary_size() {
            return Err(ClassifierError::ModelError(format!(
                "Classifier expects {} features but the vectorizer produces {}",
                classifier.n_features(),
                vectorizer.vocabulary_size()
            )));
        }
        Ok(Self { vectorizer, classifier, label_kind })
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    pub fn classifier(&self) -> &LogisticRegression {
        &self.classifier
    }

    pub fn label_kind(&self) -> LabelKind {
        self.label_kind
    }

    /// Returns information about the model's current state
    pub fn info(&self) -> super::ModelInfo {
        super::ModelInfo {
            num_classes: self.classifier.classes().len(),
            class_labels: self.classifier.classes().to_vec(),
            vocabulary_size: self.vectorizer.vocabulary_size(),
            label_kind: self.label_kind,
            n_iter: self.classifier.n_iter(),
            converged: self.classifier.converged(),
        }
    }

    /// Predicts a label for every text, in input order.
    pub fn predict<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Label>, ClassifierError> {
        let features = self.vectorizer.transform(texts)?;
        self.classifier
            .predict(&features)?
            .iter()
            .map(|canonical| Label::from_canonical(self.label_kind, canonical))
            .collect()
    }

    /// Like [`predict`](Self::predict), with class probabilities attached.
    pub fn predict_with_scores<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Prediction>, ClassifierError> {
        let features = self.vectorizer.transform(texts)?;
        let classes = self.classifier.classes();
        self.classifier
            .predict_proba(&features)?
            .into_iter()
            .map(|proba| {
                let best = argmax(&proba);
                Ok(Prediction {
                    label: Label::from_canonical(self.label_kind, &classes[best])?,
                    probability: proba[best],
                    scores: classes.iter().cloned().zip(proba).collect(),
                })
            })
            .collect()
    }
}
