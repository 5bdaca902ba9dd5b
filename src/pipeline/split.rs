use std::collections::BTreeMap;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplitError {
    #[error("Need at least 2 examples to split, got {0}")]
    TooFewExamples(usize),
    #[error("Class '{label}' has {count} member(s); stratification needs at least 2")]
    ClassTooSmall { label: String, count: usize },
    #[error("Test split of {n_test} cannot hold one example of each of {n_classes} classes")]
    TestTooSmall { n_test: usize, n_classes: usize },
    #[error("Train split of {n_train} cannot hold one example of each of {n_classes} classes")]
    TrainTooSmall { n_train: usize, n_classes: usize },
}

/// Indices into the original dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    /// Whether class proportions were preserved
    pub stratified: bool,
}

/// Size of the held-out part: `ceil(test_size * n)`, kept inside `[1, n - 1]`.
pub fn test_count(n: usize, test_size: f64) -> usize {
    let raw = (test_size * n as f64 - 1e-9).ceil().max(0.0) as usize;
    raw.clamp(1, n.saturating_sub(1).max(1))
}

/// Shuffles all indices with a seeded RNG and cuts off the test part.
pub fn random_split(n: usize, test_size: f64, seed: u64) -> Result<Split, SplitError> {
    if n < 2 {
        return Err(SplitError::TooFewExamples(n));
    }
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(test_count(n, test_size));
    Ok(Split { train, test: indices, stratified: false })
}

/// Splits so that every class appears in both parts in roughly its dataset proportion.
///
/// Each class gets one test and one train member up front; the remaining test
/// slots go by largest remainder of `n_test * count / n`, ties to the
/// lexicographically smaller label.
pub fn stratified_split<S: AsRef<str>>(labels: &[S], test_size: f64, seed: u64) -> Result<Split, SplitError> {
    let n = labels.len();
    if n < 2 {
        return Err(SplitError::TooFewExamples(n));
    }

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        groups.entry(label.as_ref()).or_default().push(i);
    }

    if let Some((label, members)) = groups.iter().find(|(_, members)| members.len() < 2) {
        return Err(SplitError::ClassTooSmall {
            label: label.to_string(),
            count: members.len(),
        });
    }

    let n_classes = groups.len();
    let n_test = test_count(n, test_size);
    let n_train = n - n_test;
    if n_test < n_classes {
        return Err(SplitError::TestTooSmall { n_test, n_classes });
    }
    if n_train < n_classes {
        return Err(SplitError::TrainTooSmall { n_train, n_classes });
    }

    let counts: Vec<usize> = groups.values().map(Vec::len).collect();
    let allocation = allocate(&counts, n, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for (mut members, take) in groups.into_values().zip(allocation) {
        members.shuffle(&mut rng);
        let rest = members.split_off(take);
        test.extend(members);
        train.extend(rest);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(Split { train, test, stratified: true })
}

/// Test slots per class, in the order of `counts`.
fn allocate(counts: &[usize], n: usize, n_test: usize) -> Vec<usize> {
    let shares: Vec<f64> = counts
        .iter()
        .map(|&count| n_test as f64 * count as f64 / n as f64)
        .collect();
    let mut allocation: Vec<usize> = shares
        .iter()
        .zip(counts)
        .map(|(&share, &count)| (share.floor() as usize).clamp(1, count - 1))
        .collect();

    let mut total: usize = allocation.iter().sum();
    while total < n_test {
        let candidates = (0..counts.len()).filter(|&c| allocation[c] < counts[c] - 1);
        let Some(c) = pick(candidates, |c| shares[c] - allocation[c] as f64) else { break };
        allocation[c] += 1;
        total += 1;
    }
    while total > n_test {
        let candidates = (0..counts.len()).filter(|&c| allocation[c] > 1);
        let Some(c) = pick(candidates, |c| allocation[c] as f64 - shares[c]) else { break };
        allocation[c] -= 1;
        total -= 1;
    }
    allocation
}

// First index with the strictly largest key.
fn pick(candidates: impl Iterator<Item = usize>, key: impl Fn(usize) -> f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for c in candidates {
        let k = key(c);
        if best.map_or(true, |(_, best_key)| k > best_key) {
            best = Some((c, k));
        }
    }
    best.map(|(c, _)| c)
}

/// Stratified when there is more than one label and it is feasible, plain otherwise.
///
/// Only fails when there are fewer than 2 examples.
pub fn train_test_split<S: AsRef<str>>(labels: &[S], test_size: f64, seed: u64) -> Result<Split, SplitError> {
    let first = labels.first().map(AsRef::as_ref);
    let multi_class = labels.iter().any(|l| Some(l.as_ref()) != first);

    if multi_class {
        match stratified_split(labels, test_size, seed) {
            Ok(split) => {
                debug!("Stratified split: {} train, {} test", split.train.len(), split.test.len());
                return Ok(split);
            }
            Err(SplitError::TooFewExamples(n)) => return Err(SplitError::TooFewExamples(n)),
            Err(e) => warn!("Stratified split not possible ({}); falling back to a random split", e),
        }
    }

    let split = random_split(labels.len(), test_size, seed)?;
    debug!("Random split: {} train, {} test", split.train.len(), split.test.len());
    Ok(split)
}
