//! Tensor backend used for inference.
//!
//! The backend carries no autodiff wrapper, so dropout is the identity and
//! batch-norm layers read their running statistics.

use burn::backend::{ndarray::NdArrayDevice, NdArray};

pub type InferenceBackend = NdArray<f32>;

pub fn default_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}
