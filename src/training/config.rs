use serde::{Deserialize, Serialize};

use crate::error::{GanError, Result};
use crate::training::metrics::Metric;

/// Loop settings: logging cadence, reported metrics, run length
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Print the metrics line every N steps
    pub log_every: u64,
    /// Metrics printed on each line, in this order
    pub metrics: Vec<Metric>,
    /// Stop after this many steps; `None` runs until terminated
    pub max_steps: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            log_every: 10,
            metrics: vec![Metric::DiscriminatorLoss, Metric::GeneratorLoss],
            max_steps: None,
        }
    }
}

impl TrainerConfig {
    /// Short run for smoke testing
    pub fn quick_test() -> Self {
        Self {
            log_every: 1,
            metrics: vec![
                Metric::DiscriminatorLoss,
                Metric::GeneratorLoss,
                Metric::DiscriminatorLog,
            ],
            max_steps: Some(20),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.log_every == 0 {
            return Err(GanError::config("log_every must be positive"));
        }
        Ok(())
    }
}

/// Step decay of the learning rate, driven by the shared step counter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LrDecay {
    /// Multiplier applied every `every` steps
    pub factor: f64,
    pub every: u64,
    /// Floor the rate never drops below
    #[serde(default)]
    pub min: f64,
}

/// Hyperparameters of the shared Adam optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Required; a build without it is rejected
    pub learning_rate: Option<f64>,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    pub decay: Option<LrDecay>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            learning_rate: None,
            beta1: 0.5,
            beta2: 0.999,
            epsilon: 1e-8,
            decay: None,
        }
    }
}

impl OptimizerConfig {
    pub fn with_learning_rate(learning_rate: f64) -> Self {
        Self {
            learning_rate: Some(learning_rate),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<f64> {
        let learning_rate = self
            .learning_rate
            .ok_or_else(|| GanError::config("optimizer.learning_rate is required"))?;
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(GanError::config(format!(
                "optimizer.learning_rate must be positive, got {learning_rate}"
            )));
        }
        if let Some(decay) = &self.decay {
            if decay.every == 0 || !(decay.factor > 0.0 && decay.factor <= 1.0) {
                return Err(GanError::config(
                    "optimizer.decay needs every > 0 and factor in (0, 1]",
                ));
            }
        }
        Ok(learning_rate)
    }

    /// Learning rate in effect at `step`
    pub fn learning_rate_at(&self, base: f64, step: u64) -> f64 {
        match &self.decay {
            Some(decay) => {
                let periods = i32::try_from(step / decay.every).unwrap_or(i32::MAX);
                (base * decay.factor.powi(periods)).max(decay.min)
            }
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_learning_rate() {
        let err = OptimizerConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("learning_rate"));
    }

    #[test]
    fn test_decay_schedule() {
        let config = OptimizerConfig {
            decay: Some(LrDecay {
                factor: 0.5,
                every: 100,
                min: 0.001,
            }),
            ..OptimizerConfig::with_learning_rate(0.01)
        };
        let base = config.validate().unwrap();
        assert_eq!(config.learning_rate_at(base, 0), 0.01);
        assert_eq!(config.learning_rate_at(base, 99), 0.01);
        assert_eq!(config.learning_rate_at(base, 100), 0.005);
        assert_eq!(config.learning_rate_at(base, 10_000), 0.001);
    }

    #[test]
    fn test_decay_clamps_at_floor_for_huge_steps() {
        let config = OptimizerConfig {
            decay: Some(LrDecay {
                factor: 0.5,
                every: 1,
                min: 1e-5,
            }),
            ..OptimizerConfig::with_learning_rate(0.01)
        };
        let base = config.validate().unwrap();
        for step in [u64::from(u32::MAX) * 2, u64::MAX] {
            assert_eq!(config.learning_rate_at(base, step), 1e-5);
        }
    }

    #[test]
    fn test_zero_log_interval_rejected() {
        let config = TrainerConfig {
            log_every: 0,
            ..TrainerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
