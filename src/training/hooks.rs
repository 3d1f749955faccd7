use std::time::{Duration, Instant};

use burn::tensor::TensorData;
use tracing::debug;

use crate::{data::HostBatch, training::metrics::StepScalars};

/// Tensors an observer can ask to see after each step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepTensor {
    RealScore,
    FakeScore,
    Generated,
}

/// Host copies of one step's results
#[derive(Debug, Clone)]
pub struct StepOutputs {
    /// Index of the step that produced these outputs
    pub step: u64,
    pub scalars: StepScalars,
    /// Only the tensors requested by the observer, in request order
    pub tensors: Vec<(StepTensor, TensorData)>,
}

impl StepOutputs {
    pub fn tensor(&self, kind: StepTensor) -> Option<&TensorData> {
        self.tensors
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, data)| data)
    }
}

/// Synchronous callbacks around each training step.
///
/// Observers only receive host copies and cannot touch parameters.
pub trait StepObserver {
    fn name(&self) -> &str;

    /// Extra tensors to copy into `StepOutputs`
    fn step_tensors(&self) -> Vec<StepTensor> {
        Vec::new()
    }

    fn before_step(&mut self, _step: u64, _batches: &[HostBatch]) {}

    fn after_step(&mut self, _outputs: &StepOutputs) {}
}

/// Logs wall time per step at debug level
#[derive(Debug, Default)]
pub struct TimingObserver {
    started: Option<Instant>,
    total: Duration,
    steps: u64,
}

impl TimingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mean_step_time(&self) -> Option<Duration> {
        if self.steps == 0 {
            return None;
        }
        Some(self.total / self.steps as u32)
    }
}

impl StepObserver for TimingObserver {
    fn name(&self) -> &str {
        "timing"
    }

    fn before_step(&mut self, _step: u64, _batches: &[HostBatch]) {
        self.started = Some(Instant::now());
    }

    fn after_step(&mut self, outputs: &StepOutputs) {
        if let Some(started) = self.started.take() {
            let elapsed = started.elapsed();
            self.total += elapsed;
            self.steps += 1;
            debug!(step = outputs.step, elapsed_ms = elapsed.as_millis() as u64, "step finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_needs_matching_before_step() {
        let mut timing = TimingObserver::new();
        let outputs = StepOutputs {
            step: 0,
            scalars: StepScalars::default(),
            tensors: Vec::new(),
        };

        timing.after_step(&outputs);
        assert!(timing.mean_step_time().is_none());

        timing.before_step(0, &[]);
        timing.after_step(&outputs);
        assert!(timing.mean_step_time().is_some());
    }

    #[test]
    fn test_tensor_lookup() {
        let outputs = StepOutputs {
            step: 3,
            scalars: StepScalars::default(),
            tensors: vec![(StepTensor::RealScore, TensorData::new(vec![1.0f32, 2.0], [2, 1]))],
        };
        assert!(outputs.tensor(StepTensor::RealScore).is_some());
        assert!(outputs.tensor(StepTensor::Generated).is_none());
    }
}
