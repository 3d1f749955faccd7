use burn::{
    data::dataloader::batcher::Batcher,
    optim::Optimizer,
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor, TensorData,
    },
};
use tracing::{error, info};

use crate::{
    config::GanConfig,
    data::{ImageBatcher, ImageItem, InputStreams},
    error::{GanError, Result},
    model::{AdversarialNetwork, Gan},
    training::{
        config::TrainerConfig,
        context::{LoopState, TerminationHandle, TrainingContext},
        hooks::{StepObserver, StepOutputs, StepTensor, TimingObserver},
        loss::LossFunction,
        metrics::{format_line, Metric, MetricsAccumulator, StepScalars},
        optimizer::{FusedUpdate, OptimizerBuildRequest, StepEvaluation},
    },
};

/// What one completed step produced
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: u64,
    pub scalars: StepScalars,
    /// Configured metrics, in declared order
    pub values: Vec<(Metric, f32)>,
    /// The metrics line, when this step fell on the logging interval
    pub line: Option<String>,
}

#[derive(Debug, Clone)]
pub enum StepOutcome {
    Completed(StepReport),
    Terminated,
}

/// End-of-run statistics
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub steps: u64,
    pub state: LoopState,
    pub avg_d_loss: f64,
    pub avg_g_loss: f64,
    pub last: Option<StepScalars>,
}

/// Drives simultaneous generator/discriminator updates from the input streams.
///
/// `Init -> Stepping* -> Terminated | Failed`. A failed loop refuses every
/// further step.
pub struct SimultaneousTrainer<B, N, O>
where
    B: AutodiffBackend,
    N: AdversarialNetwork<B>,
    O: Optimizer<N, B>,
{
    network: N,
    inputs: InputStreams,
    update: FusedUpdate<B, N, O>,
    config: TrainerConfig,
    context: TrainingContext<B>,
    /// Each observer with the tensors it declared at registration
    observers: Vec<(Box<dyn StepObserver>, Vec<StepTensor>)>,
    batcher: ImageBatcher,
    accumulator: MetricsAccumulator,
    last: Option<StepScalars>,
}

impl<B, N, O> SimultaneousTrainer<B, N, O>
where
    B: AutodiffBackend,
    N: AdversarialNetwork<B>,
    O: Optimizer<N, B>,
{
    pub fn new(
        network: N,
        inputs: InputStreams,
        update: FusedUpdate<B, N, O>,
        config: TrainerConfig,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            network,
            inputs,
            update,
            config,
            context: TrainingContext::new(device),
            observers: Vec::new(),
            batcher: ImageBatcher::new(),
            accumulator: MetricsAccumulator::new(),
            last: None,
        })
    }

    /// Adds an observer; only allowed before the first step
    pub fn register(&mut self, observer: Box<dyn StepObserver>) -> Result<()> {
        if self.context.state != LoopState::Init {
            return Err(GanError::config(format!(
                "observer '{}' registered after training started",
                observer.name()
            )));
        }
        let tensors = observer.step_tensors();
        self.observers.push((observer, tensors));
        Ok(())
    }

    pub fn termination_handle(&self) -> TerminationHandle {
        self.context.termination.clone()
    }

    pub fn current_step(&self) -> u64 {
        self.context.step
    }

    pub fn state(&self) -> LoopState {
        self.context.state
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn into_network(self) -> N {
        self.network
    }

    /// Runs one step, or reports termination at this boundary
    pub fn step(&mut self) -> Result<StepOutcome> {
        match self.context.state {
            LoopState::Failed => {
                return Err(GanError::LoopFailed {
                    step: self.context.step,
                })
            }
            LoopState::Terminated => return Ok(StepOutcome::Terminated),
            LoopState::Init | LoopState::Stepping => {}
        }

        if self.context.termination.is_requested() {
            info!(step = self.context.step, "termination requested");
            self.context.state = LoopState::Terminated;
            return Ok(StepOutcome::Terminated);
        }

        self.context.state = LoopState::Stepping;
        match self.advance() {
            Ok(report) => Ok(StepOutcome::Completed(report)),
            Err(err) => {
                error!(step = self.context.step, error = %err, "training step failed");
                self.context.state = LoopState::Failed;
                Err(err)
            }
        }
    }

    /// Steps until `max_steps` is reached or termination is requested
    pub fn run(&mut self, max_steps: Option<u64>) -> Result<TrainingSummary> {
        loop {
            if max_steps.is_some_and(|max| self.context.step >= max) {
                break;
            }
            if let StepOutcome::Terminated = self.step()? {
                break;
            }
        }
        Ok(self.summary())
    }

    pub fn summary(&self) -> TrainingSummary {
        TrainingSummary {
            steps: self.context.step,
            state: self.context.state,
            avg_d_loss: self.accumulator.avg_d_loss(),
            avg_g_loss: self.accumulator.avg_g_loss(),
            last: self.last,
        }
    }

    fn advance(&mut self) -> Result<StepReport> {
        let step = self.context.step;
        let batches = self.inputs.next_batches()?;

        for (observer, _) in self.observers.iter_mut() {
            observer.before_step(step, &batches);
        }

        let inputs: Vec<Tensor<B, 4>> = batches
            .into_iter()
            .map(|batch| {
                Batcher::<B, ImageItem, Tensor<B, 4>>::batch(
                    &self.batcher,
                    batch.into_items(),
                    &self.context.device,
                )
            })
            .collect();

        let (network, evaluation) =
            self.update
                .step(&self.network, &inputs, step, &self.config.metrics)?;
        self.network = network;
        let scalars = evaluation.scalars;
        let values = scalars.select(&self.config.metrics);

        for (observer, declared) in self.observers.iter_mut() {
            let tensors = declared
                .iter()
                .map(|&kind| (kind, host_copy(&evaluation, kind)))
                .collect();
            observer.after_step(&StepOutputs {
                step,
                scalars,
                tensors,
            });
        }

        self.accumulator.update(&scalars);
        self.last = Some(scalars);
        self.context.step += 1;

        let line = (step % self.config.log_every == 0).then(|| format_line(step, &values));
        if let Some(line) = &line {
            println!("{line}");
        }

        Ok(StepReport {
            step,
            scalars,
            values,
            line,
        })
    }
}

fn host_copy<B: Backend>(
    evaluation: &StepEvaluation<B>,
    kind: StepTensor,
) -> TensorData {
    match kind {
        StepTensor::RealScore => evaluation.real_score.to_data(),
        StepTensor::FakeScore => evaluation.fake_score.to_data(),
        StepTensor::Generated => evaluation.generated.to_data(),
    }
}

/// Opens the inputs, builds the reference network and binds the optimizer
pub fn build_trainer<B: AutodiffBackend>(
    config: &GanConfig,
    device: B::Device,
) -> Result<SimultaneousTrainer<B, Gan<B>, impl Optimizer<Gan<B>, B>>> {
    config.validate()?;
    let options = config.input.decode_options()?;
    let inputs = InputStreams::create(&config.input.roots, &options)?;

    let network = config.model.init::<B>(options.sample_shape(), &device);
    let loss = config
        .loss
        .map(|loss| Box::new(loss.init()) as Box<dyn LossFunction<B>>);
    let update = OptimizerBuildRequest::for_network(&network, loss, config.optimizer.clone())
        .build::<Gan<B>>()?;

    info!(
        streams = inputs.len(),
        parameters = config.model.count_parameters(options.sample_shape()),
        kl = config.loss.is_some_and(|loss| loss.kl),
        "trainer ready"
    );

    SimultaneousTrainer::new(network, inputs, update, config.trainer.clone(), device)
}

/// Main training entry point
pub fn train<B: AutodiffBackend>(
    config: GanConfig,
    device: B::Device,
) -> Result<(Gan<B>, TrainingSummary)> {
    let mut trainer = build_trainer::<B>(&config, device)?;
    trainer.register(Box::new(TimingObserver::new()))?;

    let summary = trainer.run(config.trainer.max_steps)?;
    info!(
        steps = summary.steps,
        avg_d_loss = summary.avg_d_loss,
        avg_g_loss = summary.avg_g_loss,
        "training finished"
    );
    Ok((trainer.into_network(), summary))
}
