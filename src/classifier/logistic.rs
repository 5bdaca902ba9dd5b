use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::lbfgs::{self, LbfgsOptions};
use super::utils::{argmax, log_sum_exp, softmax, sparse_dot};
use super::vectorizer::FeatureVector;

/// How training samples are weighted in the loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    /// Every sample counts once
    Uniform,
    /// Samples are weighted by `n_samples / (n_classes * class_count)`
    Balanced,
}

/// Settings for the logistic regression classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Inverse of the L2 regularization strength
    pub c: f64,
    pub max_iter: usize,
    /// Gradient tolerance for convergence
    pub tol: f64,
    /// L-BFGS memory size
    pub history: usize,
    pub class_weight: ClassWeight,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 2000,
            tol: 1e-4,
            history: 10,
            class_weight: ClassWeight::Balanced,
        }
    }
}

/// Multinomial logistic regression over sparse feature vectors.
///
/// The objective is the class-weighted cross entropy plus an L2 penalty
/// `‖W‖² / 2C` on the coefficients (intercepts are not penalized). It is
/// minimized with L-BFGS. Hitting the iteration cap is not an error: the
/// best-effort parameters are kept and [`converged`](Self::converged)
/// reports `false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    config: ClassifierConfig,
    classes: Vec<String>,
    coef: Array2<f64>,
    intercept: Array1<f64>,
    n_iter: usize,
    converged: bool,
    fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl LogisticRegression {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            coef: Array2::zeros((0, 0)),
            intercept: Array1::zeros(0),
            n_iter: 0,
            converged: false,
            fitted: false,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Known class labels, sorted.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.coef.ncols()
    }

    pub fn coef(&self) -> &Array2<f64> {
        &self.coef
    }

    pub fn intercept(&self) -> &Array1<f64> {
        &self.intercept
    }

    /// Solver iterations used by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn sample_weights(&self, targets: &[usize], n_classes: usize) -> Vec<f64> {
        match self.config.class_weight {
            ClassWeight::Uniform => vec![1.0; targets.len()],
            ClassWeight::Balanced => {
                let mut counts = vec![0usize; n_classes];
                for &t in targets {
                    counts[t] += 1;
                }
                let n = targets.len() as f64;
                let class_weights: Vec<f64> = counts
                    .iter()
                    .map(|&count| n / (n_classes as f64 * count as f64))
                    .collect();
                targets.iter().map(|&t| class_weights[t]).collect()
            }
        }
    }

    /// Fits the model from scratch on `features` and `labels`.
    pub fn fit(&mut self, features: &[FeatureVector], labels: &[String]) -> Result<(), ClassifierError> {
        if features.is_empty() {
            return Err(ClassifierError::ValidationError("Cannot fit on zero samples".into()));
        }
        if features.len() != labels.len() {
            return Err(ClassifierError::ValidationError(format!(
                "Got {} feature vectors but {} labels",
                features.len(),
                labels.len()
            )));
        }
        let n_features = features[0].dim();
        if let Some(pos) = features.iter().position(|x| x.dim() != n_features) {
            return Err(ClassifierError::ValidationError(format!(
                "Feature vector {} has dimension {}, expected {}",
                pos + 1,
                features[pos].dim(),
                n_features
            )));
        }

        let classes: Vec<String> = labels.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let index: BTreeMap<&str, usize> = classes.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();
        let targets: Vec<usize> = labels.iter().map(|l| index[l.as_str()]).collect();
        let n_classes = classes.len();

        self.classes = classes;
        self.fitted = true;

        if n_classes == 1 {
            debug!("Single class '{}' in training data; classifier is constant", self.classes[0]);
            self.coef = Array2::zeros((1, n_features));
            self.intercept = Array1::zeros(1);
            self.n_iter = 0;
            self.converged = true;
            return Ok(());
        }

        let weights = self.sample_weights(&targets, n_classes);
        let penalty = 1.0 / self.config.c;
        let n_coef = n_classes * n_features;

        let objective = |theta: &Array1<f64>| {
            let mut grad = Array1::zeros(theta.len());
            let mut loss = 0.0;
            let mut logits = vec![0.0; n_classes];

            for ((x, &target), &weight) in features.iter().zip(&targets).zip(&weights) {
                for (c, logit) in logits.iter_mut().enumerate() {
                    let row = theta.slice(s![c * n_features..(c + 1) * n_features]);
                    *logit = theta[n_coef + c] + sparse_dot(x, row);
                }
                loss += weight * (log_sum_exp(&logits) - logits[target]);

                for (c, p) in softmax(&logits).into_iter().enumerate() {
                    let residual = weight * (p - if c == target { 1.0 } else { 0.0 });
                    for (j, v) in x.iter() {
                        grad[c * n_features + j] += residual * v;
                    }
                    grad[n_coef + c] += residual;
                }
            }

            let coef = theta.slice(s![..n_coef]);
            loss += 0.5 * penalty * coef.dot(&coef);
            grad.slice_mut(s![..n_coef]).scaled_add(penalty, &coef);
            (loss, grad)
        };

        let options = LbfgsOptions {
            max_iter: self.config.max_iter,
            tol: self.config.tol,
            history: self.config.history,
        };
        let result = lbfgs::minimize(objective, Array1::zeros(n_coef + n_classes), &options);

        if result.converged {
            debug!("L-BFGS converged after {} iterations (loss {:.6})", result.n_iter, result.value);
        } else {
            warn!(
                "L-BFGS did not converge within {} iterations (loss {:.6}); keeping best-effort coefficients",
                result.n_iter, result.value
            );
        }

        let theta = result.x;
        self.coef = Array2::from_shape_fn((n_classes, n_features), |(c, j)| theta[c * n_features + j]);
        self.intercept = Array1::from_shape_fn(n_classes, |c| theta[n_coef + c]);
        self.n_iter = result.n_iter;
        self.converged = result.converged;
        Ok(())
    }

    /// Raw per-class scores for one vector, in [`classes`](Self::classes) order.
    pub fn decision_function(&self, x: &FeatureVector) -> Result<Vec<f64>, ClassifierError> {
        if !self.fitted {
            return Err(ClassifierError::NotFitted("Classifier has not been fit".into()));
        }
        if x.dim() != self.n_features() {
            return Err(ClassifierError::PredictionError(format!(
                "Feature vector has dimension {}, classifier expects {}",
                x.dim(),
                self.n_features()
            )));
        }
        Ok((0..self.classes.len())
            .map(|c| self.intercept[c] + sparse_dot(x, self.coef.row(c)))
            .collect())
    }

    pub fn predict_proba(&self, features: &[FeatureVector]) -> Result<Vec<Vec<f64>>, ClassifierError> {
        features
            .iter()
            .map(|x| self.decision_function(x).map(|scores| softmax(&scores)))
            .collect()
    }

    pub fn predict(&self, features: &[FeatureVector]) -> Result<Vec<String>, ClassifierError> {
        features
            .iter()
            .map(|x| {
                self.decision_function(x)
                    .map(|scores| self.classes[argmax(&scores)].clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(dim: usize, hot: usize) -> FeatureVector {
        FeatureVector::from_pairs(dim, [(hot, 1.0)])
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_separable_binary() {
        let x: Vec<FeatureVector> = (0..8).map(|i| one_hot(2, i % 2)).collect();
        let y = labels(&["a", "b", "a", "b", "a", "b", "a", "b"]);

        let mut clf = LogisticRegression::default();
        clf.fit(&x, &y).unwrap();

        assert!(clf.converged());
        assert_eq!(clf.classes(), &["a".to_string(), "b".to_string()]);
        assert_eq!(clf.predict(&[one_hot(2, 0), one_hot(2, 1)]).unwrap(), labels(&["a", "b"]));
    }

    #[test]
    fn test_three_classes_probabilities() {
        let x: Vec<FeatureVector> = (0..9).map(|i| one_hot(3, i % 3)).collect();
        let y = labels(&["x", "y", "z", "x", "y", "z", "x", "y", "z"]);

        let mut clf = LogisticRegression::default();
        clf.fit(&x, &y).unwrap();

        let proba = clf.predict_proba(&[one_hot(3, 2)]).unwrap();
        assert_eq!(proba[0].len(), 3);
        assert!((proba[0].iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(argmax(&proba[0]), 2);
    }

    #[test]
    fn test_balanced_weights_counter_imbalance() {
        let clf = LogisticRegression::default();
        let weights = clf.sample_weights(&[0, 0, 0, 1], 2);
        assert!((weights[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((weights[3] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_is_constant() {
        let x = vec![one_hot(2, 0), one_hot(2, 1)];
        let mut clf = LogisticRegression::default();
        clf.fit(&x, &labels(&["only", "only"])).unwrap();
        assert_eq!(clf.predict(&[FeatureVector::zeros(2)]).unwrap(), labels(&["only"]));
    }

    #[test]
    fn test_iteration_cap_keeps_model() {
        let x: Vec<FeatureVector> = (0..8).map(|i| one_hot(2, i % 2)).collect();
        let y = labels(&["a", "b", "a", "b", "a", "b", "a", "b"]);

        let config = ClassifierConfig { max_iter: 1, tol: 1e-12, ..ClassifierConfig::default() };
        let mut clf = LogisticRegression::new(config);
        clf.fit(&x, &y).unwrap();

        assert!(!clf.converged());
        assert!(clf.is_fitted());
        assert_eq!(clf.predict(&[one_hot(2, 1)]).unwrap(), labels(&["b"]));
    }

    #[test]
    fn test_dimension_mismatch() {
        let x = vec![one_hot(2, 0), one_hot(2, 1)];
        let mut clf = LogisticRegression::default();
        clf.fit(&x, &labels(&["a", "b"])).unwrap();
        assert!(matches!(
            clf.predict(&[FeatureVector::zeros(5)]),
            Err(ClassifierError::PredictionError(_))
        ));
    }

    #[test]
    fn test_predict_before_fit() {
        let clf = LogisticRegression::default();
        assert!(matches!(
            clf.predict(&[FeatureVector::zeros(1)]),
            Err(ClassifierError::NotFitted(_))
        ));
    }
}
