use std::collections::{BTreeMap, HashMap, HashSet};

use lazy_static::lazy_static;
use log::{debug, warn};
use ndarray::Array1;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::utils::normalize_l2;

lazy_static! {
    /// Tokens of two or more word characters, Unicode-aware.
    static ref TOKEN_PATTERN: Regex =
        Regex::new(r"\b\w\w+\b").expect("token pattern is a valid regex");
}

/// Settings for the TF-IDF vectorizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    /// Inclusive (min, max) n-gram lengths
    pub ngram_range: (usize, usize),
    /// Terms present in fewer documents than this are dropped
    pub min_df: usize,
    /// Terms present in more than this fraction of documents are dropped
    pub max_df: f64,
    /// Replace raw term counts with `1 + ln(tf)`
    pub sublinear_tf: bool,
    /// Scale every vector to unit L2 norm
    pub l2_norm: bool,
    pub lowercase: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            ngram_range: (1, 2),
            min_df: 3,
            max_df: 0.9,
            sublinear_tf: true,
            l2_norm: true,
            lowercase: true,
        }
    }
}

/// A sparse row of the feature matrix. Entries are kept sorted by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    dim: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn zeros(dim: usize) -> Self {
        Self { dim, indices: Vec::new(), values: Vec::new() }
    }

    /// Builds a vector from `(index, value)` pairs; zero values are skipped.
    pub fn from_pairs(dim: usize, pairs: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let sorted: BTreeMap<usize, f64> = pairs
            .into_iter()
            .filter(|&(j, v)| j < dim && v != 0.0)
            .collect();
        let (indices, values) = sorted.into_iter().unzip();
        Self { dim, indices, values }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored (non-zero) entries
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn get(&self, index: usize) -> f64 {
        self.indices
            .binary_search(&index)
            .map(|pos| self.values[pos])
            .unwrap_or(0.0)
    }

    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    pub fn to_dense(&self) -> Array1<f64> {
        let mut dense = Array1::zeros(self.dim);
        for (j, v) in self.iter() {
            dense[j] = v;
        }
        dense
    }
}

/// Converts raw text into TF-IDF weighted sparse vectors.
///
/// The vocabulary (unigrams and bigrams by default) and the smoothed inverse
/// document frequencies are learned by [`fit`](Self::fit) and reused unchanged
/// by [`transform`](Self::transform) until the vectorizer is fit again.
///
/// ```
/// use ods_classifier::{TfidfVectorizer, VectorizerConfig};
///
/// let config = VectorizerConfig { min_df: 1, ..VectorizerConfig::default() };
/// let mut vectorizer = TfidfVectorizer::new(config);
/// let rows = vectorizer.fit_transform(&["hello world", "hello rust"]).unwrap();
/// assert_eq!(rows.len(), 2);
/// assert!(vectorizer.vocabulary().contains_key("hello world"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    config: VectorizerConfig,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    fitted: bool,
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::new(VectorizerConfig::default())
    }
}

impl TfidfVectorizer {
    pub fn new(config: VectorizerConfig) -> Self {
        Self {
            config,
            vocabulary: BTreeMap::new(),
            idf: Vec::new(),
            fitted: false,
        }
    }

    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Term to column index, in lexicographic term order.
    pub fn vocabulary(&self) -> &BTreeMap<String, usize> {
        &self.vocabulary
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    /// Splits a document into its n-gram terms.
    fn analyze(&self, text: &str) -> Vec<String> {
        let text = if self.config.lowercase { text.to_lowercase() } else { text.to_string() };
        let tokens: Vec<&str> = TOKEN_PATTERN.find_iter(&text).map(|m| m.as_str()).collect();

        let (min_n, max_n) = self.config.ngram_range;
        let mut terms = Vec::new();
        for n in min_n.max(1)..=max_n {
            terms.extend(tokens.windows(n).map(|gram| gram.join(" ")));
        }
        terms
    }

    /// Keeps the terms whose document frequency lies within `[min_df, max_df * n_docs]`.
    ///
    /// Returns `None` when the bounds are contradictory or nothing survives.
    fn select_terms<'a>(
        doc_freq: &'a HashMap<String, usize>,
        n_docs: usize,
        min_df: usize,
        max_df: f64,
    ) -> Option<Vec<&'a String>> {
        let max_count = max_df * n_docs as f64;
        if max_count < min_df as f64 {
            return None;
        }
        let terms: Vec<&String> = doc_freq
            .iter()
            .filter(|&(_, &df)| df >= min_df && df as f64 <= max_count)
            .map(|(term, _)| term)
            .collect();
        if terms.is_empty() { None } else { Some(terms) }
    }

    /// Learns the vocabulary and IDF weights from `documents`, replacing any previous fit.
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<(), ClassifierError> {
        if documents.is_empty() {
            return Err(ClassifierError::VectorizerError("Cannot fit on an empty corpus".into()));
        }

        let n_docs = documents.len();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let unique: HashSet<String> = self.analyze(doc.as_ref()).into_iter().collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let selected = match Self::select_terms(&doc_freq, n_docs, self.config.min_df, self.config.max_df) {
            Some(terms) => terms,
            None => {
                warn!(
                    "Document frequency bounds (min_df={}, max_df={}) leave no terms for {} documents; \
                     keeping every term",
                    self.config.min_df, self.config.max_df, n_docs
                );
                Self::select_terms(&doc_freq, n_docs, 1, 1.0).ok_or_else(|| {
                    ClassifierError::VectorizerError(
                        "Empty vocabulary: the documents contain no tokens".into(),
                    )
                })?
            }
        };

        let mut terms: Vec<&String> = selected;
        terms.sort();

        let n = n_docs as f64;
        self.idf = terms
            .iter()
            .map(|term| ((1.0 + n) / (1.0 + doc_freq[*term] as f64)).ln() + 1.0)
            .collect();
        self.vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect();
        self.fitted = true;

        debug!("Fitted vocabulary of {} terms on {} documents", self.vocabulary.len(), n_docs);
        Ok(())
    }

    /// Maps `documents` onto the learned vocabulary.
    ///
    /// Out-of-vocabulary terms are ignored, so a document with no known terms
    /// becomes an all-zero vector.
    pub fn transform<S: AsRef<str>>(&self, documents: &[S]) -> Result<Vec<FeatureVector>, ClassifierError> {
        if !self.fitted {
            return Err(ClassifierError::NotFitted(
                "Vectorizer has no vocabulary. Call fit() first".into(),
            ));
        }

        let dim = self.vocabulary.len();
        let rows = documents
            .iter()
            .map(|doc| {
                let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
                for term in self.analyze(doc.as_ref()) {
                    if let Some(&idx) = self.vocabulary.get(&term) {
                        *counts.entry(idx).or_insert(0.0) += 1.0;
                    }
                }

                let (indices, mut values): (Vec<usize>, Vec<f64>) = counts
                    .into_iter()
                    .map(|(idx, tf)| {
                        let tf = if self.config.sublinear_tf { 1.0 + tf.ln() } else { tf };
                        (idx, tf * self.idf[idx])
                    })
                    .unzip();
                if self.config.l2_norm {
                    normalize_l2(&mut values);
                }
                FeatureVector { dim, indices, values }
            })
            .collect();
        Ok(rows)
    }

    pub fn fit_transform<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<Vec<FeatureVector>, ClassifierError> {
        self.fit(documents)?;
        self.transform(documents)
    }
}
