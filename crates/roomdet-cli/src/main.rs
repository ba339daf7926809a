mod config;
mod menu;
mod window;
mod workflows;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use config::Config;
use roomdet_core::Prompt;
use roomdet_hw::Camera;
use std::path::PathBuf;
use workflows::Workflows;

#[derive(Parser)]
#[command(
    name = "roomdet",
    about = "Roommate detector: collect webcam datasets, train a classifier, run live detection"
)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    /// Without a subcommand the interactive menu is started
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Flags that take precedence over the config file and environment.
#[derive(Args)]
struct Overrides {
    /// V4L2 device path (e.g., /dev/video0)
    #[arg(long, global = true)]
    device: Option<String>,
    /// Capture width; also the model input width
    #[arg(long, global = true)]
    width: Option<u32>,
    /// Capture height; also the model input height
    #[arg(long, global = true)]
    height: Option<u32>,
    /// Parent directory of per-roommate datasets
    #[arg(long, global = true)]
    datasets_dir: Option<PathBuf>,
    /// Directory for trained models and result graphs
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(device) = self.device {
            config.camera_device = device;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(dir) = self.datasets_dir {
            config.datasets_dir = dir;
        }
        if let Some(dir) = self.models_dir {
            config.models_dir = dir;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add samples to a roommate's dataset (SPACE saves, ESC finishes)
    Capture {
        /// Roommate name; normalized into the dataset directory name
        label: String,
    },
    /// Train a model on every dataset in the datasets directory
    Train {
        /// Name the model and results graph are saved under
        name: String,
    },
    /// Run live detection with a trained model
    Detect {
        /// Model name (looked up in the models directory) or path to a _model.bin file
        model: String,
    },
    /// List V4L2 capture devices
    Devices,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    cli.overrides.apply(&mut config);
    tracing::debug!(?config, "configuration resolved");

    let mut flows = Workflows::new(config);
    let mut prompt = Prompt::stdio();

    match cli.command {
        None => menu::run_menu(&mut prompt, &mut flows)?,
        Some(Commands::Capture { label }) => flows.capture(&mut prompt, Some(label))?,
        Some(Commands::Train { name }) => flows.train(&mut prompt, Some(name))?,
        Some(Commands::Detect { model }) => flows.detect(&mut prompt, Some(model))?,
        Some(Commands::Devices) => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for dev in devices {
                println!("{}\t{} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
    }

    Ok(())
}
