use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    data::InputConfig,
    error::{GanError, Result},
    model::NetworkConfig,
    training::{LossConfig, OptimizerConfig, TrainerConfig},
};

/// Complete run description, usually read from a JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GanConfig {
    pub input: InputConfig,
    /// Absent means no loss is bound; training refuses to start
    pub loss: Option<LossConfig>,
    pub optimizer: OptimizerConfig,
    pub trainer: TrainerConfig,
    pub model: NetworkConfig,
}

impl GanConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| GanError::io(path, e))?;
        let config: GanConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks everything that can be checked without touching the inputs
    pub fn validate(&self) -> Result<()> {
        if self.loss.is_none() {
            return Err(GanError::config("the `loss` section is required"));
        }
        self.input.decode_options()?.validate()?;
        self.optimizer.validate()?;
        self.trainer.validate()?;
        if self.model.latent_dim == 0 || self.model.hidden_size == 0 {
            return Err(GanError::config("model sizes must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::Metric;
    use std::io::Write;

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_full_file() {
        let file = write_config(
            r#"{
                "input": {"roots": ["data/a", "data/b"], "format": "jpg", "width": 32,
                          "height": 16, "channels": 1, "resize": true, "sequential": true,
                          "batch_size": 8},
                "loss": {"kl": true},
                "optimizer": {"learning_rate": 0.0002, "decay": {"factor": 0.5, "every": 1000}},
                "trainer": {"log_every": 5, "metrics": ["g_loss", "d_log"]},
                "model": {"latent_dim": 16}
            }"#,
        );
        let config = GanConfig::load(file.path()).unwrap();
        assert_eq!(config.input.roots.len(), 2);
        assert_eq!(config.input.decode_options().unwrap().sample_shape(), (16, 32, 1));
        assert_eq!(config.loss, Some(LossConfig { kl: true }));
        assert_eq!(config.optimizer.learning_rate, Some(0.0002));
        assert_eq!(config.optimizer.beta1, 0.5);
        assert_eq!(config.trainer.metrics, vec![Metric::GeneratorLoss, Metric::DiscriminatorLog]);
        assert_eq!(config.trainer.max_steps, None);
        assert_eq!(config.model.latent_dim, 16);
        assert_eq!(config.model.hidden_size, 256);
    }

    #[test]
    fn test_missing_learning_rate() {
        let file = write_config(r#"{"loss": {}}"#);
        match GanConfig::load(file.path()) {
            Err(GanError::Configuration(msg)) => assert!(msg.contains("learning_rate")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_missing_loss() {
        let file = write_config(r#"{"optimizer": {"learning_rate": 0.001}}"#);
        assert!(matches!(
            GanConfig::load(file.path()),
            Err(GanError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_format_and_bad_json() {
        let file = write_config(
            r#"{"loss": {}, "optimizer": {"learning_rate": 0.001}, "input": {"format": "gif"}}"#,
        );
        assert!(matches!(
            GanConfig::load(file.path()),
            Err(GanError::UnsupportedFormat(_))
        ));

        let file = write_config("{ not json");
        assert!(matches!(GanConfig::load(file.path()), Err(GanError::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            GanConfig::load("/nonexistent/gan.json"),
            Err(GanError::Io { .. })
        ));
    }
}
