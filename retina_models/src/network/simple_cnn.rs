//! Four-block convolutional classifier.
//!
//! Architecture:
//! - conv/bn/relu blocks with 32, 64, 128 and 256 filters
//! - max-pooling after the first three blocks
//! - global average pooling
//! - dropout followed by a single linear layer

use super::{
    block::{linear_params, ConvBlock},
    Network,
};
use burn::{
    module::Module,
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig,
    },
    tensor::{backend::Backend, Tensor},
};

const CHANNELS: [usize; 5] = [3, 32, 64, 128, 256];

#[derive(Module, Debug)]
pub struct SimpleCnn<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
    pub global_pool: AdaptiveAvgPool2d,
    pub dropout: Dropout,
    pub head: Linear<B>,
}

impl<B: Backend> SimpleCnn<B> {
    pub fn new(num_classes: usize, device: &B::Device) -> Self {
        let last = CHANNELS.len() - 2;
        let blocks = CHANNELS
            .windows(2)
            .enumerate()
            .map(|(i, pair)| ConvBlock::new(pair[0], pair[1], i != last, device))
            .collect();

        Self {
            blocks,
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(0.5).init(),
            head: LinearConfig::new(CHANNELS[CHANNELS.len() - 1], num_classes).init(device),
        }
    }
}

impl<B: Backend> Network<B> for SimpleCnn<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self
            .blocks
            .iter()
            .fold(x, |x, block| block.forward(x));

        // [B, C, 1, 1] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.dropout.forward(x);
        self.head.forward(x)
    }

    fn trainable_params(&self) -> usize {
        self.blocks
            .iter()
            .map(ConvBlock::trainable_params)
            .sum::<usize>()
            + linear_params(&self.head)
    }

    fn min_input_side() -> usize {
        // one halving per pooled block
        1 << (CHANNELS.len() - 2)
    }

    /// `features.{4i}` is the conv and `features.{4i+1}` the batch-norm of
    /// block `i`; `classifier.1` is the linear head.
    fn pytorch_key_remaps() -> Vec<(String, String)> {
        let mut remaps: Vec<(String, String)> = (0..CHANNELS.len() - 1)
            .flat_map(|i| {
                [
                    (
                        format!(r"^features\.{}\.(.+)$", 4 * i),
                        format!("blocks.{}.conv.$1", i),
                    ),
                    (
                        format!(r"^features\.{}\.(.+)$", 4 * i + 1),
                        format!("blocks.{}.bn.$1", i),
                    ),
                ]
            })
            .collect();
        remaps.push((r"^classifier\.1\.(.+)$".to_string(), "head.$1".to_string()));
        remaps
    }
}
