use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use burn::tensor::backend::Backend;

/// Lifecycle of a training loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Stepping,
    Terminated,
    Failed,
}

/// Cloneable request to stop at the next step boundary
#[derive(Debug, Clone, Default)]
pub struct TerminationHandle(Arc<AtomicBool>);

impl TerminationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run state owned by the loop
#[derive(Debug)]
pub struct TrainingContext<B: Backend> {
    pub step: u64,
    pub device: B::Device,
    pub state: LoopState,
    pub termination: TerminationHandle,
}

impl<B: Backend> TrainingContext<B> {
    pub fn new(device: B::Device) -> Self {
        Self {
            step: 0,
            device,
            state: LoopState::Init,
            termination: TerminationHandle::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, LoopState::Terminated | LoopState::Failed)
    }
}
