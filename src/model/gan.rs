use burn::{
    module::{list_param_ids, AutodiffModule, Module, ParamId},
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
};
use serde::{Deserialize, Serialize};

use crate::model::{discriminator::Discriminator, generator::Generator, AdversarialNetwork};

/// Sizes of the reference dense GAN
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub latent_dim: usize,
    pub hidden_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            latent_dim: 64,
            hidden_size: 256,
        }
    }
}

impl NetworkConfig {
    /// Small sizes for smoke runs and tests
    pub fn quick_test() -> Self {
        Self {
            latent_dim: 8,
            hidden_size: 16,
        }
    }

    /// Builds both networks for samples of shape (height, width, channels)
    pub fn init<B: Backend>(
        &self,
        sample_shape: (usize, usize, usize),
        device: &B::Device,
    ) -> Gan<B> {
        Gan {
            generator: Generator::new(self.latent_dim, self.hidden_size, sample_shape, device),
            discriminator: Discriminator::new(self.hidden_size, sample_shape, device),
        }
    }

    /// Counts trainable parameters across both networks
    pub fn count_parameters(&self, (height, width, channels): (usize, usize, usize)) -> usize {
        let pixels = height * width * channels;
        let generator = self.latent_dim * self.hidden_size
            + self.hidden_size
            + self.hidden_size * pixels
            + pixels;
        let discriminator = pixels * self.hidden_size + self.hidden_size + self.hidden_size + 1;
        generator + discriminator
    }
}

/// Reference generator/discriminator pair trained as one module
#[derive(Module, Debug)]
pub struct Gan<B: Backend> {
    pub generator: Generator<B>,
    pub discriminator: Discriminator<B>,
}

impl<B: AutodiffBackend> AdversarialNetwork<B> for Gan<B> {
    fn generate(&self, inputs: &[Tensor<B, 4>]) -> Tensor<B, 4> {
        let [batch_size, ..] = inputs[0].dims();
        self.generator.sample(batch_size, &inputs[0].device())
    }

    fn discriminate(&self, samples: Tensor<B, 4>) -> Tensor<B, 2> {
        self.discriminator.forward(samples)
    }

    fn freeze_discriminator(&self) -> Self {
        Self {
            generator: self.generator.clone(),
            discriminator: self.discriminator.clone().no_grad(),
        }
    }

    fn discriminator_vars(&self) -> Vec<ParamId> {
        list_param_ids(&self.discriminator)
    }

    fn generator_vars(&self) -> Vec<ParamId> {
        list_param_ids(&self.generator)
    }
}

impl<B: AutodiffBackend> Gan<B> {
    /// Inference copy without autodiff tracking
    pub fn inference(&self) -> Gan<B::InnerBackend> {
        self.valid()
    }
}
