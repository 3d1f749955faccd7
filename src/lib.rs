//! Simultaneous adversarial training on burn.
//!
//! Image directories or TFRecord shards feed a background batch stream, a
//! Wasserstein critic loss scores real and generated batches, and one Adam
//! instance updates both networks in a single fused step.

pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod training;

pub use config::GanConfig;
pub use error::{GanError, Result};
pub use model::{AdversarialNetwork, Gan, NetworkConfig};
pub use training::{build_trainer, train, SimultaneousTrainer, TrainingSummary};
