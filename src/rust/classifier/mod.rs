mod error;
mod inference;
mod labels;
mod model;
pub mod builder;
pub mod utils;

pub use error::ClassifierError;
pub use inference::{ImageModel, OnnxModel};
pub use labels::{load_labels, parse_labels};
pub use model::{BreedClassifier, Classification, ScoredBreed, TOP_K};
pub use builder::ClassifierBuilder;

use crate::preprocess::Normalization;

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Number of classes the model scores
    pub num_classes: usize,
    /// Labels of the classes, in output order
    pub class_labels: Vec<String>,
    /// Shape of the input batch fed to the model
    pub input_shape: [usize; 4],
    /// Pixel normalization applied before inference
    pub normalization: Normalization,
}
