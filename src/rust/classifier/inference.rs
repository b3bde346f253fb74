use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::value::{Tensor, ValueType};

use super::error::ClassifierError;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Runs a preprocessed image batch through a network and returns class scores.
///
/// Implementations must be pure: the same batch always yields the same scores,
/// and `run` never mutates shared state, so one instance can serve every
/// request concurrently.
pub trait ImageModel: Send + Sync + fmt::Debug {
    /// Scores for the single image in `batch`, one per class.
    fn run(&self, batch: Array4<f32>) -> Result<Vec<f32>, ClassifierError>;

    /// Number of classes, when the model declares it statically.
    fn output_width(&self) -> Option<usize>;
}

/// An image classifier exported to ONNX.
///
/// The model is expected to:
/// - Accept one float input of shape `[1, H, W, 3]` or `[1, 3, H, W]`
/// - Output softmax probabilities of shape `[1, num_classes]`
#[derive(Debug)]
pub struct OnnxModel {
    session: Session,
    input_name: String,
    output_width: Option<usize>,
}

impl OnnxModel {
    /// Loads the model at `path` with the given runtime settings.
    ///
    /// # Errors
    /// - `BuildError` if the file is missing or ONNX Runtime rejects it
    /// - `ModelError` if the graph has no inputs or outputs
    pub fn load<P: AsRef<Path>>(path: P, config: &RuntimeConfig) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifierError::BuildError(format!("Model file not found: {}", path.display())));
        }

        let session = create_session_builder(config)?.commit_from_file(path)?;
        Self::validate_model(&session)?;

        let input_name = session.inputs[0].name.clone();
        let output_width = match &session.outputs[0].output_type {
            ValueType::Tensor { dimensions, .. } => dimensions
                .last()
                .and_then(|&d| usize::try_from(d).ok())
                .filter(|&d| d > 0),
            _ => None,
        };
        log::info!(
            "Loaded ONNX model from {} (input '{}', {} output classes)",
            path.display(),
            input_name,
            output_width.map_or_else(|| "dynamic".to_string(), |w| w.to_string())
        );

        Ok(Self { session, input_name, output_width })
    }

    /// Checks that the graph has the single image input and the score output we drive.
    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        if session.inputs.is_empty() {
            return Err(ClassifierError::ModelError("Model must have an image input".to_string()));
        }
        if session.outputs.is_empty() {
            return Err(ClassifierError::ModelError(
                "Model must have at least 1 output for class scores".to_string(),
            ));
        }
        Ok(())
    }
}

impl ImageModel for OnnxModel {
    fn run(&self, batch: Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        let input = Tensor::from_array(batch.as_standard_layout().into_owned())
            .map_err(|e| ClassifierError::ModelError(format!("Failed to create input tensor: {}", e)))?;

        let mut input_tensors = HashMap::new();
        input_tensors.insert(self.input_name.as_str(), input);

        let outputs = self.session.run(input_tensors)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to run model: {}", e)))?;
        let scores = outputs[0].try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::ModelError(format!("Failed to extract output tensor: {}", e)))?;

        Ok(scores.iter().copied().collect())
    }

    fn output_width(&self) -> Option<usize> {
        self.output_width
    }
}
