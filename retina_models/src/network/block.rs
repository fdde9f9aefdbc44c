use burn::{
    module::{Module, Param},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Conv3x3 (padding 1), batch-norm, ReLU and an optional 2x2 max-pool.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
    pub relu: Relu,
    pub pool: Option<MaxPool2d>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, with_pool: bool, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        let bn = BatchNormConfig::new(out_channels).init(device);

        let pool = if with_pool {
            Some(MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init())
        } else {
            None
        };

        Self {
            conv,
            bn,
            relu: Relu::new(),
            pool,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);

        match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        }
    }

    /// Convolution weights and bias plus batch-norm scale and shift.
    pub fn trainable_params(&self) -> usize {
        numel(&self.conv.weight)
            + self.conv.bias.as_ref().map(numel).unwrap_or(0)
            + numel(&self.bn.gamma)
            + numel(&self.bn.beta)
    }
}

pub fn linear_params<B: Backend>(linear: &Linear<B>) -> usize {
    numel(&linear.weight) + linear.bias.as_ref().map(numel).unwrap_or(0)
}

fn numel<B: Backend, const D: usize>(param: &Param<Tensor<B, D>>) -> usize {
    param.val().shape().num_elements()
}
