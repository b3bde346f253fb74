use std::path::Path;
use std::sync::Arc;

use log::info;

use super::error::ClassifierError;
use super::inference::{ImageModel, OnnxModel};
use super::labels::load_labels;
use super::model::BreedClassifier;
use crate::preprocess::{ImagePreprocessor, PreprocessConfig};
use crate::runtime::RuntimeConfig;

/// A builder for constructing a BreedClassifier with a fluent interface.
#[derive(Default, Debug)]
pub struct ClassifierBuilder {
    model: Option<Arc<dyn ImageModel>>,
    labels: Option<Vec<String>>,
    preprocess_config: PreprocessConfig,
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder instance with default preprocessing
    /// (224x224, raw pixel values, NHWC)
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an ONNX model from disk.
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `config` - ONNX Runtime threading and optimization settings
    ///
    /// # Returns
    /// * `Result<Self, ClassifierError>` - The builder instance if successful, or an error if:
    ///   - A model is already set
    ///   - The file doesn't exist
    ///   - ONNX Runtime fails to load it
    ///   - The model structure is invalid
    pub fn with_onnx_model<P: AsRef<Path>>(
        mut self,
        model_path: P,
        config: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        if self.model.is_some() {
            return Err(ClassifierError::BuildError("Model already set".to_string()));
        }
        let model = OnnxModel::load(model_path, config)?;
        info!("Model structure validated successfully");
        self.model = Some(Arc::new(model));
        Ok(self)
    }

    /// Uses an already constructed inference backend.
    pub fn with_model(mut self, model: impl ImageModel + 'static) -> Self {
        self.model = Some(Arc::new(model));
        self
    }

    /// Reads class labels from a class-index JSON file.
    pub fn with_labels_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ClassifierError> {
        let labels = load_labels(path)?;
        info!("Loaded {} class labels", labels.len());
        self.labels = Some(labels);
        Ok(self)
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Sets input size, normalization and layout. These must match the
    /// model's training pipeline.
    pub fn with_preprocessing(mut self, config: PreprocessConfig) -> Self {
        self.preprocess_config = config;
        self
    }

    /// Builds and returns the final BreedClassifier instance
    ///
    /// # Returns
    /// * `Result<BreedClassifier, ClassifierError>` - The classifier if successful, or an error if:
    ///   - No model is set
    ///   - No labels are set, or the label list is empty
    ///   - The model declares an output width that differs from the label count
    pub fn build(self) -> Result<BreedClassifier, ClassifierError> {
        let model = self.model
            .ok_or_else(|| ClassifierError::BuildError("A model must be set".to_string()))?;
        let labels = self.labels
            .ok_or_else(|| ClassifierError::BuildError("Class labels must be set".to_string()))?;
        if labels.is_empty() {
            return Err(ClassifierError::BuildError("At least one class label is required".to_string()));
        }

        if let Some(width) = model.output_width() {
            if width != labels.len() {
                return Err(ClassifierError::ShapeMismatch { expected: labels.len(), actual: width });
            }
        }

        Ok(BreedClassifier {
            model,
            labels: Arc::new(labels),
            preprocessor: ImagePreprocessor::new(self.preprocess_config),
        })
    }
}
