use crate::error::ModelError;
use ndarray::{Array, Ix4};

/// A loaded network ready to score preprocessed images.
pub trait Classifier: Send + Sync + 'static {
    /// Class scores for a `[1, 3, H, W]` input.
    fn classify(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, ModelError>;

    fn num_params(&self) -> usize;
}
