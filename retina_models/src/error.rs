use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to open image {path:?}: {source}")]
    ImageOpen {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Error decoding image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("Weights file not found: {0:?}")]
    WeightsNotFound(PathBuf),
    #[error("Failed to load weights from {path:?}: {reason}")]
    WeightsLoad { path: PathBuf, reason: String },
    #[error("Inference failed for model {model}: {reason}")]
    Forward { model: String, reason: String },
    #[error("Model {0} produced an empty class-score vector")]
    EmptyOutput(String),
    #[error("Network mutex poisoned: {0}")]
    LockPoisoned(String),
    #[error("Invalid model registry: {0}")]
    InvalidRegistry(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum BatchError {
    #[error("Batch contains no images, cannot average inference times")]
    EmptyBatch,
}
