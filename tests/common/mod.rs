#![allow(dead_code)]

use env_logger::{Builder, Env};
use ods_classifier::Label;

// Initialize test logger
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

pub fn text_labels(values: &[&str]) -> Vec<Label> {
    values.iter().map(|&v| Label::from(v)).collect()
}

/// Three well separated topics, six examples each.
pub fn topic_corpus() -> (Vec<&'static str>, Vec<Label>) {
    let data = [
        ("the team won the match", "sports"),
        ("a great match for the team", "sports"),
        ("the team scored a goal", "sports"),
        ("goal after goal in the match", "sports"),
        ("fans cheered the team", "sports"),
        ("the match ended with a late goal", "sports"),
        ("the new software release", "tech"),
        ("software update fixes the bug", "tech"),
        ("a bug in the software", "tech"),
        ("developers ship the code", "tech"),
        ("the code has a bug", "tech"),
        ("new code for the software", "tech"),
        ("the pasta recipe is tasty", "food"),
        ("a tasty soup recipe", "food"),
        ("cook the pasta slowly", "food"),
        ("this recipe needs fresh pasta", "food"),
        ("tasty bread and soup", "food"),
        ("soup recipe with fresh herbs", "food"),
    ];
    let texts = data.iter().map(|&(t, _)| t).collect();
    let labels = data.iter().map(|&(_, l)| Label::from(l)).collect();
    (texts, labels)
}

pub fn scenario() -> (Vec<&'static str>, Vec<Label>) {
    (
        vec!["good service", "bad service", "great support", "terrible support"],
        text_labels(&["1", "0", "1", "0"]),
    )
}
