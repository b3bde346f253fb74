mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use common::{png_bytes, FixedModel, BREED_INFO_JSON, LABELS_JSON};
use pawpredict::classifier::parse_labels;
use pawpredict::{BreedCatalog, BreedClassifier, ClassifierError, PreprocessConfig};

fn setup_test_classifier(scores: Vec<f32>) -> BreedClassifier {
    let (model, _) = FixedModel::new(scores);
    BreedClassifier::builder()
        .with_model(model)
        .with_labels(parse_labels(LABELS_JSON).unwrap())
        .with_preprocessing(PreprocessConfig { width: 48, height: 48, ..Default::default() })
        .build()
        .expect("Failed to create classifier")
}

#[test]
fn test_end_to_end_classification() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let classifier = setup_test_classifier(vec![0.05, 0.15, 0.72, 0.08]);
    let catalog = BreedCatalog::from_json(BREED_INFO_JSON)?;

    let result = classifier.classify(&png_bytes(300, 200))?;
    assert_eq!(result.top.label, "pug");
    assert_eq!(result.top.breed, "Pug");
    assert_eq!(result.top.percentage, 72.0);
    assert_eq!(catalog.lookup(&result.top.label).origin, "China");

    let ranked: Vec<&str> = result.top_k.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(ranked, vec!["pug", "golden_retriever", "shih-tzu"]);
    Ok(())
}

#[test]
fn test_unlisted_breed_gets_default_info() -> Result<(), Box<dyn std::error::Error>> {
    let classifier = setup_test_classifier(vec![0.1, 0.1, 0.1, 0.7]);
    let catalog = BreedCatalog::from_json(BREED_INFO_JSON)?;

    let result = classifier.classify(&png_bytes(32, 32))?;
    assert_eq!(result.top.breed, "Shih Tzu");
    assert!(catalog.find(&result.top.label).is_none());

    let info = catalog.lookup(&result.top.label);
    assert_eq!(info.origin, "Unknown");
    assert_eq!(info.size, "Medium");
    Ok(())
}

#[test]
fn test_ties_resolve_to_lowest_index() -> Result<(), ClassifierError> {
    let classifier = setup_test_classifier(vec![0.4, 0.1, 0.4, 0.1]);
    let result = classifier.classify(&png_bytes(16, 16))?;
    assert_eq!(result.top.label, "beagle");
    let ranked: Vec<&str> = result.top_k.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(ranked, vec!["beagle", "pug", "golden_retriever"]);
    Ok(())
}

#[test]
fn test_rejects_garbage_before_inference() {
    let (model, calls) = FixedModel::new(vec![0.25; 4]);
    let classifier = BreedClassifier::builder()
        .with_model(model)
        .with_labels(parse_labels(LABELS_JSON).unwrap())
        .build()
        .unwrap();

    for bytes in [&b""[..], b"definitely not an image"] {
        let err = classifier.classify(bytes).unwrap_err();
        assert!(matches!(err, ClassifierError::Preprocess(_)), "{:?}", err);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_label_count_must_match_model() {
    let (model, _) = FixedModel::new(vec![0.5, 0.5]);
    let err = BreedClassifier::builder()
        .with_model(model)
        .with_labels(parse_labels(LABELS_JSON).unwrap())
        .build()
        .unwrap_err();
    assert!(matches!(err, ClassifierError::ShapeMismatch { expected: 4, actual: 2 }), "{:?}", err);
}

#[test]
fn test_info() {
    let classifier = setup_test_classifier(vec![0.25; 4]);
    let info = classifier.info();
    assert_eq!(info.num_classes, 4);
    assert_eq!(info.input_shape, [1, 48, 48, 3]);
    assert_eq!(info.class_labels[3], "shih-tzu");
}

#[test]
fn test_thread_safety() {
    let classifier = Arc::new(setup_test_classifier(vec![0.1, 0.6, 0.2, 0.1]));
    let image = Arc::new(png_bytes(64, 64));
    let mut handles = vec![];

    for _ in 0..4 {
        let classifier = Arc::clone(&classifier);
        let image = Arc::clone(&image);
        handles.push(thread::spawn(move || {
            let result = classifier.classify(&image).unwrap();
            assert_eq!(result.top.breed, "Golden Retriever");
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}
