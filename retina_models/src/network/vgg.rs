//! VGG16 with batch normalization and a replaceable classification head.

use super::{
    block::{linear_params, ConvBlock},
    Network,
};
use burn::{
    module::Module,
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Output channels per stage; every stage ends with a max-pool.
const STAGES: [(usize, usize); 5] = [(64, 2), (128, 2), (256, 3), (512, 3), (512, 3)];
const POOLED_SIDE: usize = 7;
const HIDDEN: usize = 4096;

#[derive(Module, Debug)]
pub struct Vgg16Bn<B: Backend> {
    pub convs: Vec<ConvBlock<B>>,
    pub avgpool: AdaptiveAvgPool2d,
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
    pub head: Linear<B>,
    pub relu: Relu,
    pub dropout: Dropout,
}

impl<B: Backend> Vgg16Bn<B> {
    pub fn new(num_classes: usize, device: &B::Device) -> Self {
        let mut convs = Vec::new();
        let mut in_channels = 3;
        for (out_channels, depth) in STAGES {
            for layer in 0..depth {
                let with_pool = layer == depth - 1;
                convs.push(ConvBlock::new(in_channels, out_channels, with_pool, device));
                in_channels = out_channels;
            }
        }

        let flat = in_channels * POOLED_SIDE * POOLED_SIDE;
        Self {
            convs,
            avgpool: AdaptiveAvgPool2dConfig::new([POOLED_SIDE, POOLED_SIDE]).init(),
            fc1: LinearConfig::new(flat, HIDDEN).init(device),
            fc2: LinearConfig::new(HIDDEN, HIDDEN).init(device),
            head: LinearConfig::new(HIDDEN, num_classes).init(device),
            relu: Relu::new(),
            dropout: DropoutConfig::new(0.5).init(),
        }
    }
}

impl<B: Backend> Network<B> for Vgg16Bn<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.convs.iter().fold(x, |x, block| block.forward(x));
        let x = self.avgpool.forward(x);
        let x: Tensor<B, 2> = x.flatten(1, 3);

        let x = self.dropout.forward(self.relu.forward(self.fc1.forward(x)));
        let x = self.dropout.forward(self.relu.forward(self.fc2.forward(x)));
        self.head.forward(x)
    }

    fn trainable_params(&self) -> usize {
        self.convs
            .iter()
            .map(ConvBlock::trainable_params)
            .sum::<usize>()
            + linear_params(&self.fc1)
            + linear_params(&self.fc2)
            + linear_params(&self.head)
    }

    fn min_input_side() -> usize {
        1 << STAGES.len()
    }

    fn pytorch_key_remaps() -> Vec<(String, String)> {
        let mut remaps = Vec::new();
        let mut index = 0;
        let mut block = 0;
        for (_, depth) in STAGES {
            for _ in 0..depth {
                // conv, bn, relu
                remaps.push((
                    format!(r"^features\.{}\.(.+)$", index),
                    format!("convs.{}.conv.$1", block),
                ));
                remaps.push((
                    format!(r"^features\.{}\.(.+)$", index + 1),
                    format!("convs.{}.bn.$1", block),
                ));
                index += 3;
                block += 1;
            }
            // max-pool
            index += 1;
        }

        for (position, field) in [(0, "fc1"), (3, "fc2"), (6, "head")] {
            remaps.push((
                format!(r"^classifier\.{}\.(.+)$", position),
                format!("{}.$1", field),
            ));
        }
        remaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{default_device, InferenceBackend};

    type TestBackend = InferenceBackend;

    #[test]
    fn test_vgg_key_remaps_follow_torchvision_layout() {
        let remaps = Vgg16Bn::<TestBackend>::pytorch_key_remaps();

        // 13 conv/bn pairs and three linear layers
        assert_eq!(remaps.len(), 13 * 2 + 3);
        assert_eq!(remaps[0].0, r"^features\.0\.(.+)$");
        assert_eq!(remaps[0].1, "convs.0.conv.$1");
        // second stage starts after 2 * 3 layers and a pool
        assert_eq!(remaps[4].0, r"^features\.7\.(.+)$");
        assert_eq!(remaps[4].1, "convs.2.conv.$1");
        // last conv of the network
        assert_eq!(remaps[24].0, r"^features\.40\.(.+)$");
        assert_eq!(remaps[25].0, r"^features\.41\.(.+)$");
        assert_eq!(remaps[25].1, "convs.12.bn.$1");
        assert_eq!(remaps[28].1, "head.$1");
    }

    #[test]
    fn test_vgg_min_input_side() {
        assert_eq!(Vgg16Bn::<TestBackend>::min_input_side(), 32);
    }

    #[test]
    #[ignore = "allocates the full 134M parameter network"]
    fn test_vgg_output_shape_and_params() {
        let device = default_device();
        let model = Vgg16Bn::<TestBackend>::new(5, &device);

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &device);
        assert_eq!(model.forward(input).dims(), [1, 5]);

        // torchvision vgg16_bn with a 5-class head
        assert_eq!(model.trainable_params(), 134_289_477);
    }
}
