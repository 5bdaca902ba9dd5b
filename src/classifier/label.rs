use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ClassifierError;

/// A class label as supplied by callers: either text or an integer.
///
/// Inside the model every label is handled through its canonical string
/// form (its `Display` output); the model remembers the [`LabelKind`] it was
/// trained with so predictions come back in the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Integer(i64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    Integer,
    Text,
}

impl Label {
    pub fn kind(&self) -> LabelKind {
        match self {
            Self::Integer(_) => LabelKind::Integer,
            Self::Text(_) => LabelKind::Text,
        }
    }

    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Rebuilds a label of `kind` from its canonical form.
    pub fn from_canonical(kind: LabelKind, canonical: &str) -> Result<Self, ClassifierError> {
        match kind {
            LabelKind::Text => Ok(Self::Text(canonical.to_string())),
            LabelKind::Integer => canonical.parse().map(Self::Integer).map_err(|_| {
                ClassifierError::PredictionError(format!("'{}' is not an integer label", canonical))
            }),
        }
    }

    /// The single kind shared by `labels`, or `None` when there are no labels.
    pub fn common_kind(labels: &[Label]) -> Result<Option<LabelKind>, ClassifierError> {
        let Some(first) = labels.first() else {
            return Ok(None);
        };
        let kind = first.kind();
        match labels.iter().position(|l| l.kind() != kind) {
            Some(pos) => Err(ClassifierError::ValidationError(format!(
                "Label {} is {:?} but earlier labels are {:?}; a dataset cannot mix label types",
                pos + 1,
                labels[pos].kind(),
                kind
            ))),
            None => Ok(Some(kind)),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Label {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}
