use burn::{
    module::{AutodiffModule, ParamId},
    tensor::{backend::AutodiffBackend, Tensor},
};

/// The network graph the trainer drives.
///
/// Implementors own both the generator and the discriminator so that one
/// optimizer instance can update them together. The two parameter lists must
/// not overlap.
pub trait AdversarialNetwork<B: AutodiffBackend>: AutodiffModule<B> {
    /// Produces one fake sample per row of `inputs[0]`; further inputs are
    /// conditioning domains for image-to-image setups.
    fn generate(&self, inputs: &[Tensor<B, 4>]) -> Tensor<B, 4>;

    /// Scores a batch of samples: [batch, height, width, channels] -> [batch, 1]
    fn discriminate(&self, samples: Tensor<B, 4>) -> Tensor<B, 2>;

    /// A copy whose discriminator parameters are not tracked by autodiff
    fn freeze_discriminator(&self) -> Self;

    fn discriminator_vars(&self) -> Vec<ParamId>;

    fn generator_vars(&self) -> Vec<ParamId>;
}
