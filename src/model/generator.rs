use burn::{
    module::Module,
    tensor::{activation::tanh, backend::Backend, Distribution, Tensor},
};

use crate::model::dense::{DenseStack, DenseStackConfig};

/// Maps latent noise to images in [-1, 1]
#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    pub stack: DenseStack<B>,
    latent_dim: usize,
    height: usize,
    width: usize,
    channels: usize,
}

impl<B: Backend> Generator<B> {
    pub fn new(
        latent_dim: usize,
        hidden_size: usize,
        (height, width, channels): (usize, usize, usize),
        device: &B::Device,
    ) -> Self {
        Self {
            stack: DenseStackConfig::new(latent_dim, hidden_size, height * width * channels)
                .init(device),
            latent_dim,
            height,
            width,
            channels,
        }
    }

    /// latent: [batch, latent_dim] -> images: [batch, height, width, channels]
    pub fn forward(&self, latent: Tensor<B, 2>) -> Tensor<B, 4> {
        let [batch_size, _] = latent.dims();
        let flat = tanh(self.stack.forward(latent, 0.0));
        flat.reshape([batch_size, self.height, self.width, self.channels])
    }

    /// Draws standard normal noise and generates `batch_size` images
    pub fn sample(&self, batch_size: usize, device: &B::Device) -> Tensor<B, 4> {
        let latent = Tensor::random(
            [batch_size, self.latent_dim],
            Distribution::Normal(0.0, 1.0),
            device,
        );
        self.forward(latent)
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }
}
