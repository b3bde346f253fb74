//! Dog breed prediction service.
//!
//! An uploaded photo is preprocessed into a fixed-shape tensor, scored by an
//! ONNX image classifier, and returned with static breed metadata. Callers
//! presenting a valid bearer token also get their predictions recorded.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use pawpredict::{BreedCatalog, BreedClassifier, RuntimeConfig};
//!
//! let classifier = BreedClassifier::builder()
//!     .with_onnx_model("models/breed_classifier.onnx", &RuntimeConfig::default())?
//!     .with_labels_file("models/class_indices.json")?
//!     .build()?;
//! let catalog = BreedCatalog::from_file("models/breed_info.json")?;
//!
//! let result = classifier.classify(&std::fs::read("rex.jpg")?)?;
//! let info = catalog.lookup(&result.top.label);
//! println!("{} from {}", result.top.breed, info.origin);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! [`BreedClassifier`] is immutable after construction; share one instance
//! across threads or tasks with `Arc`.

pub mod api;
pub mod auth;
pub mod breeds;
pub mod classifier;
pub mod history;
pub mod model_manager;
pub mod preprocess;
mod runtime;
pub mod server;

pub use api::{router, AppState};
pub use auth::{AuthError, AuthenticatedUser, TokenVerifier};
pub use breeds::{BreedCatalog, BreedInfo, BreedKey};
pub use classifier::{BreedClassifier, ClassifierBuilder, ClassifierError, ClassifierInfo, ImageModel};
pub use model_manager::{ModelError, ModelManager};
pub use preprocess::{ImagePreprocessor, Normalization, PreprocessConfig, TensorLayout};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use server::ServerConfig;

pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
