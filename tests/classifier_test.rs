mod common;

use ods_classifier::{
    ClassifierConfig, ClassifierError, Label, LabelKind, LogisticRegression, Model, TfidfVectorizer,
    VectorizerConfig,
};

fn fit_topics() -> Result<Model, ClassifierError> {
    let (texts, labels) = common::topic_corpus();
    let canonical: Vec<String> = labels.iter().map(Label::canonical).collect();

    let mut vectorizer = TfidfVectorizer::default();
    let features = vectorizer.fit_transform(&texts)?;
    let mut classifier = LogisticRegression::default();
    classifier.fit(&features, &canonical)?;
    Model::new(vectorizer, classifier, LabelKind::Text)
}

#[test]
fn test_basic_classification() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let model = fit_topics()?;

    let predictions = model.predict(&[
        "the team scored a late goal",
        "a bug in the new software",
        "tasty pasta recipe",
    ])?;
    assert_eq!(
        predictions,
        vec![Label::from("sports"), Label::from("tech"), Label::from("food")]
    );
    Ok(())
}

#[test]
fn test_probabilities_are_distributions() -> Result<(), Box<dyn std::error::Error>> {
    let model = fit_topics()?;
    for prediction in model.predict_with_scores(&["the match", "fresh soup", "zzz unknown words"])? {
        let total: f64 = prediction.scores.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(prediction.scores.len(), 3);
        assert_eq!(prediction.scores[&prediction.label.canonical()], prediction.probability);
    }
    Ok(())
}

#[test]
fn test_vocabulary_respects_min_df() -> Result<(), Box<dyn std::error::Error>> {
    let (texts, _) = common::topic_corpus();
    let mut vectorizer = TfidfVectorizer::default();
    vectorizer.fit(&texts)?;

    // "herbs" appears once, "goal" in three documents
    assert!(!vectorizer.vocabulary().contains_key("herbs"));
    assert!(vectorizer.vocabulary().contains_key("goal"));
    assert!(vectorizer.vocabulary().contains_key("the team"));
    Ok(())
}

#[test]
fn test_unknown_text_is_zero_vector() -> Result<(), Box<dyn std::error::Error>> {
    let (texts, _) = common::topic_corpus();
    let mut vectorizer = TfidfVectorizer::default();
    vectorizer.fit(&texts)?;

    let vectors = vectorizer.transform(&["qwerty asdf", ""])?;
    assert!(vectors.iter().all(|v| v.is_zero()));
    assert!(vectors.iter().all(|v| v.dim() == vectorizer.vocabulary_size()));
    Ok(())
}

#[test]
fn test_predict_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let model = fit_topics()?;
    let inputs = ["the team", "the code", "the soup"];
    assert_eq!(model.predict_with_scores(&inputs)?, model.predict_with_scores(&inputs)?);
    Ok(())
}

#[test]
fn test_uniform_weights_still_fit() -> Result<(), Box<dyn std::error::Error>> {
    let (texts, labels) = common::topic_corpus();
    let canonical: Vec<String> = labels.iter().map(Label::canonical).collect();
    let mut vectorizer = TfidfVectorizer::new(VectorizerConfig { ngram_range: (1, 1), ..VectorizerConfig::default() });
    let features = vectorizer.fit_transform(&texts)?;

    let mut classifier = LogisticRegression::new(ClassifierConfig {
        class_weight: ods_classifier::ClassWeight::Uniform,
        ..ClassifierConfig::default()
    });
    classifier.fit(&features, &canonical)?;
    assert!(classifier.converged());
    assert_eq!(classifier.classes(), ["food", "sports", "tech"]);
    Ok(())
}
