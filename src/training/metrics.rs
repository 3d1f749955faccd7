use serde::{Deserialize, Serialize};

/// Added to the discriminator loss before taking its log
const TINY: f32 = 1e-12;

/// A scalar reported on the metrics line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "d_loss")]
    DiscriminatorLoss,
    #[serde(rename = "g_loss")]
    GeneratorLoss,
    /// `-ln|d_loss|`
    #[serde(rename = "d_log")]
    DiscriminatorLog,
    /// mean critic score on real samples
    #[serde(rename = "real_score")]
    RealScore,
    /// mean critic score on generated samples
    #[serde(rename = "fake_score")]
    FakeScore,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::DiscriminatorLoss => "d_loss",
            Metric::GeneratorLoss => "g_loss",
            Metric::DiscriminatorLog => "d_log",
            Metric::RealScore => "real_score",
            Metric::FakeScore => "fake_score",
        }
    }
}

/// Host-side scalars of one evaluated step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepScalars {
    pub d_loss: f32,
    pub g_loss: f32,
    pub real_score: f32,
    pub fake_score: f32,
}

impl StepScalars {
    pub fn value(&self, metric: Metric) -> f32 {
        match metric {
            Metric::DiscriminatorLoss => self.d_loss,
            Metric::GeneratorLoss => self.g_loss,
            Metric::DiscriminatorLog => -(self.d_loss + TINY).abs().ln(),
            Metric::RealScore => self.real_score,
            Metric::FakeScore => self.fake_score,
        }
    }

    /// Values of `metrics`, in the given order
    pub fn select(&self, metrics: &[Metric]) -> Vec<(Metric, f32)> {
        metrics.iter().map(|&m| (m, self.value(m))).collect()
    }
}

/// `"<step> <name>=<value> ..."`
pub fn format_line(step: u64, values: &[(Metric, f32)]) -> String {
    let mut line = step.to_string();
    for (metric, value) in values {
        line.push_str(&format!(" {}={:.4}", metric.name(), value));
    }
    line
}

/// Running averages over a training run
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    total_d_loss: f64,
    total_g_loss: f64,
    num_steps: usize,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, scalars: &StepScalars) {
        self.total_d_loss += scalars.d_loss as f64;
        self.total_g_loss += scalars.g_loss as f64;
        self.num_steps += 1;
    }

    pub fn avg_d_loss(&self) -> f64 {
        if self.num_steps == 0 { return 0.0; }
        self.total_d_loss / self.num_steps as f64
    }

    pub fn avg_g_loss(&self) -> f64 {
        if self.num_steps == 0 { return 0.0; }
        self.total_g_loss / self.num_steps as f64
    }

    pub fn steps(&self) -> usize {
        self.num_steps
    }
}
