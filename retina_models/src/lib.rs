mod burn_service;
mod inference_service;
mod model_service;
mod preprocess;
mod state;

pub mod backend;
pub mod config;
pub mod error;
pub mod network;

pub use burn_service::BurnClassifier;
pub use error::{BatchError, ModelError};
pub use inference_service::{
    argmax, round4, BatchTimings, InferenceService, ModelPrediction, Predictions,
};
pub use model_service::Classifier;
pub use preprocess::{preprocess_bytes, preprocess_path, to_input_tensor};
pub use state::{ModelEntry, ModelRegistry};
