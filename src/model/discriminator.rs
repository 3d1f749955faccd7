use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};

use crate::model::dense::{DenseStack, DenseStackConfig};

const LEAKY_SLOPE: f64 = 0.2;

/// Scores images with an unbounded critic value
#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    pub stack: DenseStack<B>,
}

impl<B: Backend> Discriminator<B> {
    pub fn new(
        hidden_size: usize,
        (height, width, channels): (usize, usize, usize),
        device: &B::Device,
    ) -> Self {
        Self {
            stack: DenseStackConfig::new(height * width * channels, hidden_size, 1).init(device),
        }
    }

    /// images: [batch, height, width, channels] -> scores: [batch, 1]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, height, width, channels] = images.dims();
        let flat = images.reshape([batch_size, height * width * channels]);
        self.stack.forward(flat, LEAKY_SLOPE)
    }
}
