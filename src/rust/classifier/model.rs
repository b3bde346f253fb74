use std::sync::Arc;

use ndarray::Array4;
use serde::Serialize;

use super::error::ClassifierError;
use super::inference::ImageModel;
use super::utils::{round_percentage, top_k};
use crate::breeds::display_name;
use crate::preprocess::ImagePreprocessor;

/// Number of ranked alternatives returned with every prediction.
pub const TOP_K: usize = 3;

/// A class index with its label and probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredBreed {
    #[serde(skip)]
    pub index: usize,
    /// Raw class label as listed in the class-index file
    #[serde(skip)]
    pub label: String,
    /// Title-cased display name
    pub breed: String,
    pub confidence: f32,
    pub percentage: f64,
}

/// Outcome of classifying one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub top: ScoredBreed,
    pub top_k: Vec<ScoredBreed>,
}

/// A thread-safe dog breed classifier.
///
/// All fields are immutable after construction, so one instance wrapped in
/// `Arc` serves every request without locking.
///
/// ```rust,no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use pawpredict::{BreedClassifier, RuntimeConfig};
///
/// let classifier = BreedClassifier::builder()
///     .with_onnx_model("models/breed_classifier.onnx", &RuntimeConfig::default())?
///     .with_labels_file("models/class_indices.json")?
///     .build()?;
///
/// let bytes = std::fs::read("rex.jpg")?;
/// let result = classifier.classify(&bytes)?;
/// println!("{} ({:.1}%)", result.top.breed, result.top.percentage);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BreedClassifier {
    pub(super) model: Arc<dyn ImageModel>,
    pub(super) labels: Arc<Vec<String>>,
    pub(super) preprocessor: ImagePreprocessor,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<BreedClassifier>();
    }
};

impl BreedClassifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> super::ClassifierInfo {
        super::ClassifierInfo {
            num_classes: self.labels.len(),
            class_labels: self.labels.as_ref().clone(),
            input_shape: self.preprocessor.config().batch_shape(),
            normalization: self.preprocessor.config().normalization,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Runs the model and returns one probability per label.
    ///
    /// # Errors
    /// - `ModelError` if inference fails
    /// - `ShapeMismatch` if the score count differs from the label count
    pub fn predict(&self, batch: Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        let scores = self.model.run(batch)?;
        if scores.len() != self.labels.len() {
            return Err(ClassifierError::ShapeMismatch {
                expected: self.labels.len(),
                actual: scores.len(),
            });
        }
        Ok(scores)
    }

    /// Preprocesses raw image bytes, runs the model, and ranks the classes.
    ///
    /// # Errors
    /// - `Preprocess` if the bytes are not a decodable image
    /// - Everything [`predict`](Self::predict) can return
    pub fn classify(&self, image_bytes: &[u8]) -> Result<Classification, ClassifierError> {
        let batch = self.preprocessor.preprocess(image_bytes)?;
        let scores = self.predict(batch)?;

        let ranked: Vec<ScoredBreed> = top_k(&scores, TOP_K)
            .into_iter()
            .map(|i| self.scored(i, scores[i]))
            .collect();
        let top = ranked
            .first()
            .cloned()
            .ok_or_else(|| ClassifierError::ModelError("Model returned no scores".into()))?;

        Ok(Classification { top, top_k: ranked })
    }

    fn scored(&self, index: usize, confidence: f32) -> ScoredBreed {
        let label = self.labels.get(index)
            .cloned()
            .unwrap_or_else(|| format!("Unknown_Breed_{}", index));
        ScoredBreed {
            index,
            breed: display_name(&label),
            label,
            confidence,
            percentage: round_percentage(confidence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::PreprocessConfig;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    #[derive(Debug)]
    struct FixedScores(Vec<f32>);

    impl ImageModel for FixedScores {
        fn run(&self, _batch: Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
            Ok(self.0.clone())
        }

        fn output_width(&self) -> Option<usize> {
            Some(self.0.len())
        }
    }

    fn png() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(40, 30)).write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn classifier(scores: Vec<f32>, labels: &[&str]) -> BreedClassifier {
        BreedClassifier::builder()
            .with_model(FixedScores(scores))
            .with_labels(labels.iter().map(|s| s.to_string()).collect())
            .with_preprocessing(PreprocessConfig { width: 16, height: 16, ..Default::default() })
            .build()
            .unwrap()
    }

    #[test]
    fn test_classify_ranks_top_three() {
        let c = classifier(vec![0.1, 0.6, 0.05, 0.25], &["beagle", "golden_retriever", "pug", "shih-tzu"]);
        let result = c.classify(&png()).unwrap();
        assert_eq!(result.top.breed, "Golden Retriever");
        assert_eq!(result.top.label, "golden_retriever");
        assert_eq!(result.top.percentage, 60.0);
        let breeds: Vec<_> = result.top_k.iter().map(|s| s.breed.as_str()).collect();
        assert_eq!(breeds, vec!["Golden Retriever", "Shih Tzu", "Beagle"]);
    }

    #[test]
    fn test_score_count_must_match_labels() {
        let c = BreedClassifier {
            model: Arc::new(FixedScores(vec![0.5, 0.5])),
            labels: Arc::new(vec!["a".into(), "b".into(), "c".into()]),
            preprocessor: ImagePreprocessor::default(),
        };
        let err = c.classify(&png()).unwrap_err();
        assert!(matches!(err, ClassifierError::ShapeMismatch { expected: 3, actual: 2 }));
    }

    #[test]
    fn test_bad_image_is_preprocess_error() {
        let c = classifier(vec![1.0], &["beagle"]);
        assert!(matches!(c.classify(b"GIF89a-nope"), Err(ClassifierError::Preprocess(_))));
    }

    #[test]
    fn test_info() {
        let c = classifier(vec![0.5, 0.5], &["beagle", "pug"]);
        let info = c.info();
        assert_eq!(info.num_classes, 2);
        assert_eq!(info.input_shape, [1, 16, 16, 3]);
    }
}
