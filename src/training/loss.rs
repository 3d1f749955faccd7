use burn::tensor::{activation::relu, backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

/// Added to every denominator and exponential weight
pub const STABILITY_EPSILON: f32 = 1e-8;

/// Scalar discriminator and generator losses for one step
#[derive(Debug, Clone)]
pub struct LossPair<B: Backend> {
    pub discriminator: Tensor<B, 1>,
    pub generator: Tensor<B, 1>,
}

/// Pure mapping from critic scores to the two adversarial losses.
///
/// Scores are [batch, 1]; outputs are single-element tensors.
pub trait LossFunction<B: Backend> {
    fn evaluate(&self, real_score: Tensor<B, 2>, fake_score: Tensor<B, 2>) -> LossPair<B>;
}

/// The `loss` section of the configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossConfig {
    /// Stabilized relativistic mode instead of the plain Wasserstein critic
    pub kl: bool,
}

impl LossConfig {
    pub fn init(&self) -> WassersteinLoss {
        WassersteinLoss { kl: self.kl }
    }
}

/// Wasserstein critic loss with an optional stabilized relativistic variant
#[derive(Debug, Clone, Copy, Default)]
pub struct WassersteinLoss {
    pub kl: bool,
}

impl<B: Backend> LossFunction<B> for WassersteinLoss {
    fn evaluate(&self, real_score: Tensor<B, 2>, fake_score: Tensor<B, 2>) -> LossPair<B> {
        if self.kl {
            return stabilized(real_score, fake_score);
        }

        let real = real_score.mean();
        let fake = fake_score.mean();
        LossPair {
            discriminator: fake.clone() - real,
            generator: fake.neg(),
        }
    }
}

/// Hinge on the real scores plus a softmax-weighted hinge on the fake scores.
///
/// The weights are computed from `fake - max(fake)` so `exp` cannot overflow;
/// the ratio itself is unchanged by the shift.
fn stabilized<B: Backend>(real_score: Tensor<B, 2>, fake_score: Tensor<B, 2>) -> LossPair<B> {
    let loss_real = relu(real_score.neg().add_scalar(1.0)).mean();

    let shift = fake_score.clone().detach().max().reshape([1, 1]);
    let weights = (fake_score.clone() - shift).exp();
    let norm = weights.clone().mean().reshape([1, 1]).add_scalar(STABILITY_EPSILON);
    let ratio = weights.add_scalar(STABILITY_EPSILON) / norm;

    let loss_fake = relu((fake_score * ratio).add_scalar(1.0)).mean();

    LossPair {
        discriminator: loss_real + loss_fake.clone(),
        generator: loss_fake.neg(),
    }
}
