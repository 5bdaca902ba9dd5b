use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Precision, recall and F1 for one class or one averaging view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: usize,
}

/// Report keys taken by the summary rows; no class may use them.
pub const RESERVED_REPORT_KEYS: [&str; 3] = ["accuracy", "macro avg", "weighted avg"];

/// Per-class scores plus the summary rows, keyed the way the frontend reads them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    #[serde(flatten)]
    pub classes: BTreeMap<String, ClassScores>,
    pub accuracy: f64,
    #[serde(rename = "macro avg")]
    pub macro_avg: ClassScores,
    #[serde(rename = "weighted avg")]
    pub weighted_avg: ClassScores,
}

/// Metrics computed on the held-out split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub precision_macro: f64,
    pub recall_macro: f64,
    pub f1_macro: f64,
    pub accuracy: f64,
    pub precision_micro: f64,
    pub recall_micro: f64,
    pub f1_micro: f64,
    pub precision_weighted: f64,
    pub recall_weighted: f64,
    pub f1_weighted: f64,
    pub classification_report: ClassificationReport,
}

impl EvaluationReport {
    /// Every score in the report, for range checks.
    pub fn scores(&self) -> Vec<f64> {
        let report = &self.classification_report;
        let mut scores = vec![
            self.precision_macro,
            self.recall_macro,
            self.f1_macro,
            self.accuracy,
            self.precision_micro,
            self.recall_micro,
            self.f1_micro,
            self.precision_weighted,
            self.recall_weighted,
            self.f1_weighted,
            report.accuracy,
        ];
        for row in report.classes.values().chain([&report.macro_avg, &report.weighted_avg]) {
            scores.extend([row.precision, row.recall, row.f1_score]);
        }
        scores
    }
}

// Zero denominators score 0.
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    ratio(2.0 * precision * recall, precision + recall)
}

#[derive(Default, Clone, Copy)]
struct Counts {
    tp: usize,
    fp: usize,
    fn_: usize,
}

/// Scores `y_pred` against `y_true` over the union of labels seen in either.
pub fn evaluate<S: AsRef<str>, T: AsRef<str>>(y_true: &[S], y_pred: &[T]) -> EvaluationReport {
    debug_assert_eq!(y_true.len(), y_pred.len());

    let labels: BTreeSet<&str> = y_true
        .iter()
        .map(AsRef::as_ref)
        .chain(y_pred.iter().map(AsRef::as_ref))
        .collect();
    let mut counts: BTreeMap<&str, Counts> = labels.iter().map(|&l| (l, Counts::default())).collect();

    let mut correct = 0usize;
    for (truth, pred) in y_true.iter().zip(y_pred) {
        let (truth, pred) = (truth.as_ref(), pred.as_ref());
        if truth == pred {
            correct += 1;
            if let Some(c) = counts.get_mut(truth) {
                c.tp += 1;
            }
        } else {
            if let Some(c) = counts.get_mut(pred) {
                c.fp += 1;
            }
            if let Some(c) = counts.get_mut(truth) {
                c.fn_ += 1;
            }
        }
    }

    let total = y_true.len().min(y_pred.len());
    let accuracy = ratio(correct as f64, total as f64);

    let mut classes = BTreeMap::new();
    for (label, c) in &counts {
        let precision = ratio(c.tp as f64, (c.tp + c.fp) as f64);
        let recall = ratio(c.tp as f64, (c.tp + c.fn_) as f64);
        classes.insert(
            label.to_string(),
            ClassScores {
                precision,
                recall,
                f1_score: f1(precision, recall),
                support: c.tp + c.fn_,
            },
        );
    }

    let k = classes.len() as f64;
    let macro_avg = ClassScores {
        precision: ratio(classes.values().map(|s| s.precision).sum(), k),
        recall: ratio(classes.values().map(|s| s.recall).sum(), k),
        f1_score: ratio(classes.values().map(|s| s.f1_score).sum(), k),
        support: total,
    };

    let support_total: f64 = classes.values().map(|s| s.support as f64).sum();
    let weighted = |score: fn(&ClassScores) -> f64| {
        ratio(classes.values().map(|s| score(s) * s.support as f64).sum(), support_total)
    };
    let weighted_avg = ClassScores {
        precision: weighted(|s| s.precision),
        recall: weighted(|s| s.recall),
        f1_score: weighted(|s| s.f1_score),
        support: total,
    };

    // Single-label micro averages all reduce to accuracy, but count them anyway.
    let (tp, fp, fn_) = counts
        .values()
        .fold((0, 0, 0), |(tp, fp, fn_), c| (tp + c.tp, fp + c.fp, fn_ + c.fn_));
    let precision_micro = ratio(tp as f64, (tp + fp) as f64);
    let recall_micro = ratio(tp as f64, (tp + fn_) as f64);

    EvaluationReport {
        precision_macro: macro_avg.precision,
        recall_macro: macro_avg.recall,
        f1_macro: macro_avg.f1_score,
        accuracy,
        precision_micro,
        recall_micro,
        f1_micro: f1(precision_micro, recall_micro),
        precision_weighted: weighted_avg.precision,
        recall_weighted: weighted_avg.recall,
        f1_weighted: weighted_avg.f1_score,
        classification_report: ClassificationReport {
            classes,
            accuracy,
            macro_avg,
            weighted_avg,
        },
    }
}
