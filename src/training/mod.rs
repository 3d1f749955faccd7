pub mod config;
pub mod context;
pub mod hooks;
pub mod loss;
pub mod metrics;
pub mod optimizer;
pub mod trainer;

pub use config::{LrDecay, OptimizerConfig, TrainerConfig};
pub use context::{LoopState, TerminationHandle, TrainingContext};
pub use hooks::{StepObserver, StepOutputs, StepTensor, TimingObserver};
pub use loss::{LossConfig, LossFunction, LossPair, WassersteinLoss};
pub use metrics::{format_line, Metric, MetricsAccumulator, StepScalars};
pub use optimizer::{FusedUpdate, OptimizerBuildRequest, ParameterSet, StepEvaluation};
pub use trainer::{build_trainer, train, SimultaneousTrainer, StepOutcome, StepReport, TrainingSummary};
