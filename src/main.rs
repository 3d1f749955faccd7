use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use burn::{
    backend::{Autodiff, NdArray},
    tensor::Tensor,
};
use clap::{Parser, Subcommand};
use gan_trainer::{data::InputStreams, train, GanConfig, NetworkConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

type TrainBackend = Autodiff<NdArray<f32>>;
type InferBackend = NdArray<f32>;

#[derive(Parser)]
#[command(name = "gan-trainer", about = "Simultaneous GAN training on image folders or TFRecords")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the reference dense GAN
    Train {
        #[arg(long)]
        config: PathBuf,
        /// Overrides trainer.max_steps
        #[arg(long)]
        steps: Option<u64>,
        /// Overrides input.roots; repeat for multiple domains
        #[arg(long = "input")]
        inputs: Vec<PathBuf>,
    },
    /// Validate a configuration and count the samples behind each root
    Check {
        #[arg(long)]
        config: PathBuf,
    },
    /// Forward pass of an untrained network on zeros
    Smoke {
        #[arg(long, default_value_t = 8)]
        size: usize,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the metric lines
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    Registry::default().with(filter).with(fmt_layer).init();
}

fn load_config(path: &Path, inputs: Vec<PathBuf>) -> Result<GanConfig> {
    let mut config = GanConfig::load(path)
        .with_context(|| format!("loading configuration '{}'", path.display()))?;
    if !inputs.is_empty() {
        config.input.roots = inputs;
    }
    if config.input.roots.is_empty() {
        bail!("no input roots: set input.roots or pass --input");
    }
    Ok(config)
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let device = Default::default();

    match cli.command {
        Command::Train {
            config,
            steps,
            inputs,
        } => {
            let mut config = load_config(&config, inputs)?;
            if steps.is_some() {
                config.trainer.max_steps = steps;
            }
            info!(
                roots = ?config.input.roots,
                batch_size = config.input.batch_size,
                max_steps = ?config.trainer.max_steps,
                "starting training"
            );
            let (_network, summary) =
                train::<TrainBackend>(config, device).context("training failed")?;
            info!(
                steps = summary.steps,
                avg_d_loss = summary.avg_d_loss,
                avg_g_loss = summary.avg_g_loss,
                "done"
            );
        }
        Command::Check { config } => {
            let config = load_config(&config, Vec::new())?;
            let options = config.input.decode_options()?;
            let streams = InputStreams::create(&config.input.roots, &options)
                .context("opening inputs")?;
            for name in streams.names() {
                info!(root = name, "input ok");
            }
            info!(
                parameters = config.model.count_parameters(options.sample_shape()),
                "configuration ok"
            );
        }
        Command::Smoke { size } => {
            let shape = (size, size, 3);
            let network = NetworkConfig::quick_test().init::<InferBackend>(shape, &device);
            let fake = network.generator.sample(2, &device);
            let scores = network
                .discriminator
                .forward(Tensor::<InferBackend, 4>::zeros([2, size, size, 3], &device));
            info!(generated = ?fake.dims(), scores = ?scores.dims(), "forward pass ok");
        }
    }
    Ok(())
}
