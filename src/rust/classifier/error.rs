use ort::Error as OrtError;
use std::fmt;

use crate::preprocess::PreprocessError;

/// Represents the different types of errors that can occur in the breed classifier.
#[derive(Debug)]
pub enum ClassifierError {
    /// The uploaded bytes could not be turned into an input tensor
    Preprocess(PreprocessError),
    /// Error occurred while loading or running the ONNX model
    ModelError(String),
    /// Error occurred during the build phase
    BuildError(String),
    /// Error occurred while loading the class label file
    LabelError(String),
    /// The model output does not line up with the label set
    ShapeMismatch { expected: usize, actual: usize },
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preprocess(err) => write!(f, "Image preprocessing failed: {}", err),
            Self::ModelError(msg) => write!(f, "Model error: {}", msg),
            Self::BuildError(msg) => write!(f, "Build error: {}", msg),
            Self::LabelError(msg) => write!(f, "Label error: {}", msg),
            Self::ShapeMismatch { expected, actual } => write!(
                f,
                "Model produced {} scores but {} labels are loaded",
                actual, expected
            ),
        }
    }
}

impl std::error::Error for ClassifierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Preprocess(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::BuildError(err.to_string())
    }
}

impl From<PreprocessError> for ClassifierError {
    fn from(err: PreprocessError) -> Self {
        ClassifierError::Preprocess(err)
    }
}
