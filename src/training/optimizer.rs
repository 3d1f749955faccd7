use std::{collections::HashSet, marker::PhantomData};

use burn::{
    module::ParamId,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Tensor,
    },
};
use tracing::debug;

use crate::{
    error::{GanError, Result},
    model::AdversarialNetwork,
    training::{
        config::OptimizerConfig,
        loss::LossFunction,
        metrics::{Metric, StepScalars},
    },
};

/// Disjoint discriminator/generator parameter lists
#[derive(Debug, Clone)]
pub struct ParameterSet {
    pub discriminator: Vec<ParamId>,
    pub generator: Vec<ParamId>,
}

impl ParameterSet {
    pub fn from_network<B: AutodiffBackend, N: AdversarialNetwork<B>>(network: &N) -> Self {
        Self {
            discriminator: network.discriminator_vars(),
            generator: network.generator_vars(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.discriminator.is_empty() {
            return Err(GanError::config("discriminator variable list is empty"));
        }
        if self.generator.is_empty() {
            return Err(GanError::config("generator variable list is empty"));
        }
        let discriminator: HashSet<&ParamId> = self.discriminator.iter().collect();
        let shared = self
            .generator
            .iter()
            .filter(|id| discriminator.contains(id))
            .count();
        if shared > 0 {
            return Err(GanError::config(format!(
                "{shared} variables appear in both the discriminator and generator lists"
            )));
        }
        Ok(())
    }

    /// Discriminator ids followed by generator ids
    pub fn concatenated(&self) -> Vec<ParamId> {
        self.discriminator
            .iter()
            .chain(self.generator.iter())
            .cloned()
            .collect()
    }
}

/// Everything needed to bind a loss and an optimizer to one network
pub struct OptimizerBuildRequest<B: AutodiffBackend> {
    pub loss: Option<Box<dyn LossFunction<B>>>,
    pub discriminator_vars: Vec<ParamId>,
    pub generator_vars: Vec<ParamId>,
    pub hyperparameters: OptimizerConfig,
}

impl<B: AutodiffBackend> OptimizerBuildRequest<B> {
    /// Request covering the network's own parameter partitions
    pub fn for_network<N: AdversarialNetwork<B>>(
        network: &N,
        loss: Option<Box<dyn LossFunction<B>>>,
        hyperparameters: OptimizerConfig,
    ) -> Self {
        let vars = ParameterSet::from_network(network);
        Self {
            loss,
            discriminator_vars: vars.discriminator,
            generator_vars: vars.generator,
            hyperparameters,
        }
    }

    /// Binds a single Adam instance over both partitions
    pub fn build<N: AdversarialNetwork<B>>(
        self,
    ) -> Result<FusedUpdate<B, N, impl Optimizer<N, B>>> {
        let adam = AdamConfig::new()
            .with_beta_1(self.hyperparameters.beta1)
            .with_beta_2(self.hyperparameters.beta2)
            .with_epsilon(self.hyperparameters.epsilon);
        self.build_with(adam.init::<B, N>())
    }

    /// Binds a caller-supplied optimizer over both partitions
    pub fn build_with<N, O>(self, optimizer: O) -> Result<FusedUpdate<B, N, O>>
    where
        N: AdversarialNetwork<B>,
        O: Optimizer<N, B>,
    {
        let base_learning_rate = self.check()?;
        let loss = self
            .loss
            .ok_or_else(|| GanError::config("a loss function is required"))?;
        let vars = ParameterSet {
            discriminator: self.discriminator_vars,
            generator: self.generator_vars,
        };

        debug!(
            discriminator = vars.discriminator.len(),
            generator = vars.generator.len(),
            learning_rate = base_learning_rate,
            "bound fused optimizer"
        );

        Ok(FusedUpdate {
            loss,
            optimizer,
            vars,
            base_learning_rate,
            schedule: self.hyperparameters,
            _network: PhantomData,
        })
    }

    fn check(&self) -> Result<f64> {
        if self.loss.is_none() {
            return Err(GanError::config("a loss function is required"));
        }
        let learning_rate = self.hyperparameters.validate()?;
        ParameterSet {
            discriminator: self.discriminator_vars.clone(),
            generator: self.generator_vars.clone(),
        }
        .validate()?;
        Ok(learning_rate)
    }
}

/// Host-visible results of one fused evaluation
#[derive(Debug, Clone)]
pub struct StepEvaluation<B: Backend> {
    pub scalars: StepScalars,
    /// [batch, 1]
    pub real_score: Tensor<B, 2>,
    /// [batch, 1]
    pub fake_score: Tensor<B, 2>,
    /// [batch, height, width, channels]
    pub generated: Tensor<B, 4>,
}

/// One loss and one optimizer applied to both partitions in a single step
pub struct FusedUpdate<B, N, O>
where
    B: AutodiffBackend,
    N: AdversarialNetwork<B>,
    O: Optimizer<N, B>,
{
    loss: Box<dyn LossFunction<B>>,
    optimizer: O,
    vars: ParameterSet,
    base_learning_rate: f64,
    schedule: OptimizerConfig,
    _network: PhantomData<N>,
}

impl<B, N, O> FusedUpdate<B, N, O>
where
    B: AutodiffBackend,
    N: AdversarialNetwork<B>,
    O: Optimizer<N, B>,
{
    pub fn vars(&self) -> &ParameterSet {
        &self.vars
    }

    pub fn learning_rate(&self, step: u64) -> f64 {
        self.schedule
            .learning_rate_at(self.base_learning_rate, step)
    }

    /// Computes both losses and the gradients of each partition.
    ///
    /// The discriminator sees the generated batch detached, and the generator
    /// is scored through a copy of the discriminator with tracking disabled,
    /// so a single backward pass over `d_loss + g_loss` yields exactly
    /// `d(d_loss)/d(disc)` and `d(g_loss)/d(gen)`.
    pub fn evaluate(
        &self,
        network: &N,
        inputs: &[Tensor<B, 4>],
    ) -> (GradientsParams, StepEvaluation<B::InnerBackend>) {
        let fake = network.generate(inputs);

        let real_score = network.discriminate(inputs[0].clone());
        let fake_score = network.discriminate(fake.clone().detach());
        let critic = self.loss.evaluate(real_score.clone(), fake_score.clone());

        let frozen = network.freeze_discriminator();
        let fooled = frozen.discriminate(fake.clone());
        let adversary = self.loss.evaluate(real_score.clone().detach(), fooled);

        let scalars = StepScalars {
            d_loss: scalar(critic.discriminator.clone()),
            g_loss: scalar(adversary.generator.clone()),
            real_score: scalar(real_score.clone().mean()),
            fake_score: scalar(fake_score.clone().mean()),
        };

        let objective = critic.discriminator + adversary.generator;
        let mut grads = objective.backward();
        let gradients =
            GradientsParams::from_params(&mut grads, network, &self.vars.concatenated());

        let evaluation = StepEvaluation {
            scalars,
            real_score: real_score.inner(),
            fake_score: fake_score.inner(),
            generated: fake.inner(),
        };
        (gradients, evaluation)
    }

    /// Applies previously evaluated gradients with the rate scheduled for `step`
    pub fn apply(&mut self, network: &N, gradients: GradientsParams, step: u64) -> N {
        let learning_rate = self.learning_rate(step);
        self.optimizer.step(learning_rate, network.clone(), gradients)
    }

    /// Evaluates and, when both losses and every metric in `metrics` are
    /// finite, applies one update
    pub fn step(
        &mut self,
        network: &N,
        inputs: &[Tensor<B, 4>],
        step: u64,
        metrics: &[Metric],
    ) -> Result<(N, StepEvaluation<B::InnerBackend>)> {
        let (gradients, evaluation) = self.evaluate(network, inputs);
        ensure_finite(step, &evaluation.scalars, metrics)?;
        Ok((self.apply(network, gradients, step), evaluation))
    }
}

fn scalar<B: AutodiffBackend>(tensor: Tensor<B, 1>) -> f32 {
    tensor.inner().into_scalar().elem::<f32>()
}

fn ensure_finite(step: u64, scalars: &StepScalars, metrics: &[Metric]) -> Result<()> {
    let losses = [Metric::DiscriminatorLoss, Metric::GeneratorLoss];
    for metric in losses.iter().chain(metrics) {
        let value = scalars.value(*metric);
        if !value.is_finite() {
            return Err(GanError::NumericInstability {
                step,
                metric: metric.name().to_string(),
                value,
            });
        }
    }
    Ok(())
}
