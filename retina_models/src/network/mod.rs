mod block;
mod simple_cnn;
mod vgg;

pub use block::ConvBlock;
pub use simple_cnn::SimpleCnn;
pub use vgg::Vgg16Bn;

use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};

/// A classification network that maps `[batch, 3, H, W]` images to class scores.
pub trait Network<B: Backend>: Module<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2>;

    fn trainable_params(&self) -> usize;

    /// Smallest square input side that survives every pooling stage.
    fn min_input_side() -> usize
    where
        Self: Sized;

    /// Regex remaps from PyTorch state-dict keys to this module tree.
    fn pytorch_key_remaps() -> Vec<(String, String)>
    where
        Self: Sized;
}
