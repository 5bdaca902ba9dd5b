mod common;

use std::io;

use ods_classifier::{
    ClassificationService, FileModelStore, Label, MemoryModelStore, Model, ModelStore, PipelineBuilder,
    PipelineError, RetrainOutcome, ServiceError, StoreError, TrainingPipeline, TrainingSummary,
};

// A store whose disk is always full.
struct FullDiskStore;

impl ModelStore for FullDiskStore {
    fn save(&self, _model: &Model) -> Result<(), StoreError> {
        Err(StoreError::IoError(io::Error::other("disk full")))
    }

    fn load(&self) -> Result<Model, StoreError> {
        Err(StoreError::NotFound("nothing was ever saved".to_string()))
    }

    fn has_model(&self) -> bool {
        false
    }
}

fn trained(outcome: RetrainOutcome) -> TrainingSummary {
    match outcome {
        RetrainOutcome::Trained(summary) => summary,
        other => panic!("expected a trained model, got {:?}", other),
    }
}

#[test]
fn test_four_example_scenario() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let dir = tempfile::tempdir()?;
    let store = FileModelStore::new(dir.path())?;
    let (texts, labels) = common::scenario();

    let summary = trained(TrainingPipeline::default().retrain(&store, &texts, &labels)?);
    assert_eq!(summary.train_size, 3);
    assert_eq!(summary.test_size, 1);
    assert!(!summary.stratified);
    assert!(summary.report.scores().iter().all(|s| (0.0..=1.0).contains(s)));
    assert!(store.is_model_saved());
    Ok(())
}

#[test]
fn test_stratified_split_on_balanced_corpus() -> Result<(), Box<dyn std::error::Error>> {
    let store = MemoryModelStore::new();
    let (texts, labels) = common::topic_corpus();

    let summary = trained(TrainingPipeline::default().retrain(&store, &texts, &labels)?);
    assert!(summary.stratified);
    // ceil(0.2 * 18) = 4, at least one per class
    assert_eq!(summary.test_size, 4);
    assert_eq!(summary.train_size, 14);
    let report = &summary.report.classification_report;
    for class in ["food", "sports", "tech"] {
        assert!(report.classes[class].support >= 1, "{} missing from test split", class);
    }
    assert_eq!(summary.model_info.num_classes, 3);
    Ok(())
}

#[test]
fn test_retrain_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
    let (texts, labels) = common::topic_corpus();
    let pipeline = TrainingPipeline::default();

    let first = trained(pipeline.retrain(&MemoryModelStore::new(), &texts, &labels)?);
    let second = trained(pipeline.retrain(&MemoryModelStore::new(), &texts, &labels)?);
    assert_eq!(first.report, second.report);
    assert_eq!(first.model_info, second.model_info);
    Ok(())
}

#[test]
fn test_single_label_dataset_trains() -> Result<(), Box<dyn std::error::Error>> {
    let store = MemoryModelStore::new();
    let texts = ["one review", "another review", "third review", "fourth review", "fifth review"];
    let labels = common::text_labels(&["pos"; 5]);

    let summary = trained(TrainingPipeline::default().retrain(&store, &texts, &labels)?);
    assert!(!summary.stratified);
    assert_eq!(summary.test_size, 1);
    assert_eq!(summary.report.accuracy, 1.0);
    assert_eq!(store.load()?.predict(&["anything"])?, vec![Label::from("pos")]);
    Ok(())
}

#[test]
fn test_one_example_leaves_store_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let store = FileModelStore::new(dir.path())?;
    let pipeline = TrainingPipeline::default();

    let outcome = pipeline.retrain(&store, &["lonely"], &common::text_labels(&["1"]))?;
    assert!(matches!(outcome, RetrainOutcome::InsufficientExamples { received: 1 }));
    assert!(!store.is_model_saved());

    let (texts, labels) = common::scenario();
    pipeline.retrain(&store, &texts, &labels)?;
    let manifest_before = std::fs::read(store.manifest_path())?;

    pipeline.retrain(&store, &["lonely"], &common::text_labels(&["1"]))?;
    assert_eq!(std::fs::read(store.manifest_path())?, manifest_before);
    Ok(())
}

#[test]
fn test_retrain_replaces_current_model() -> Result<(), Box<dyn std::error::Error>> {
    let service = ClassificationService::new(MemoryModelStore::new());
    let (texts, labels) = common::topic_corpus();
    service.retrain(&texts, &labels)?;
    assert_eq!(service.store().load()?.info().num_classes, 3);

    let (texts, labels) = common::scenario();
    service.retrain(&texts, &labels)?;
    let info = service.store().load()?.info();
    assert_eq!(info.class_labels, vec!["0".to_string(), "1".to_string()]);

    let prediction = &service.predict(&["the team won the match"])?[0];
    assert!(prediction.label == Label::from("0") || prediction.label == Label::from("1"));
    Ok(())
}

#[test]
fn test_custom_pipeline_settings() -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = PipelineBuilder::new().with_test_size(0.5).with_seed(3).build()?;
    let (texts, labels) = common::topic_corpus();

    let summary = trained(pipeline.retrain(&MemoryModelStore::new(), &texts, &labels)?);
    assert_eq!(summary.test_size, 9);
    assert_eq!(summary.train_size, 9);
    Ok(())
}

#[test]
fn test_integer_labels_round_trip_through_service() -> Result<(), Box<dyn std::error::Error>> {
    let service = ClassificationService::new(MemoryModelStore::new());
    let (texts, _) = common::scenario();
    let labels = vec![Label::Integer(1), Label::Integer(0), Label::Integer(1), Label::Integer(0)];

    service.retrain(&texts, &labels)?;
    let prediction = &service.predict(&["good service"])?[0];
    assert!(matches!(prediction.label, Label::Integer(0 | 1)));
    Ok(())
}

#[test]
fn test_failed_save_fails_the_retrain() {
    let (texts, labels) = common::scenario();

    let result = TrainingPipeline::default().retrain(&FullDiskStore, &texts, &labels);
    match result {
        Err(PipelineError::Persistence(StoreError::IoError(e))) => assert_eq!(e.to_string(), "disk full"),
        other => panic!("expected a persistence error, got {:?}", other),
    }

    let service = ClassificationService::new(FullDiskStore);
    let result = service.retrain(&texts, &labels);
    assert!(matches!(result, Err(ServiceError::Pipeline(PipelineError::Persistence(_)))));
    assert!(!service.health().model_loaded);
}
