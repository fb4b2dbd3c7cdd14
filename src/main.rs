// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand, ValueEnum};
use depth_sample::config::Config;
use depth_sample::depth::SampleStrategy;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "depth-sample")]
#[command(about = "Depth camera viewer that reads the disparity at the center of the frame")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file (default: ~/.config/depth-sample/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Which depth-map cell becomes the reading
    #[arg(long, global = true, value_enum)]
    sample: Option<SampleArg>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SampleArg {
    /// Center of the delivered depth map
    Center,
    /// Fixed flat index 38520
    Legacy,
}

impl From<SampleArg> for SampleStrategy {
    fn from(arg: SampleArg) -> Self {
        match arg {
            SampleArg::Center => SampleStrategy::Center,
            SampleArg::Legacy => SampleStrategy::LegacyFixedIndex,
        }
    }
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Run in terminal mode (live preview with depth label)
    Terminal,

    /// List available cameras
    List,

    /// Print depth readings
    Probe {
        /// Number of readings to print (0 = until Ctrl+C)
        #[arg(short, long, default_value = "10")]
        frames: u64,

        /// Print one JSON object per reading
        #[arg(long)]
        json: bool,
    },

    /// Save one frame pair (preview, depth image, raw disparity, metadata)
    Snapshot {
        /// Output directory (default: ~/Pictures/DepthSample)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=depth_sample=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(sample) = cli.sample {
        config.sample_strategy = sample.into();
    }

    match cli.command {
        Some(Commands::Terminal) | None => depth_sample::terminal::run(&config),
        Some(Commands::List) => cli::list_cameras(&config),
        Some(Commands::Probe { frames, json }) => cli::probe(&config, frames, json),
        Some(Commands::Snapshot { output }) => cli::snapshot(&config, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_terminal() {
        let cli = Cli::try_parse_from(["depth-sample"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.sample, None);
    }

    #[test]
    fn test_probe_arguments() {
        let cli = Cli::try_parse_from(["depth-sample", "probe", "--frames", "3", "--json"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Probe {
                frames: 3,
                json: true
            })
        );
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "depth-sample",
            "snapshot",
            "--output",
            "/tmp/out",
            "--sample",
            "legacy",
            "--config",
            "/tmp/config.json",
        ])
        .unwrap();
        assert_eq!(cli.sample.map(SampleStrategy::from), Some(SampleStrategy::LegacyFixedIndex));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.json")));
        assert_eq!(
            cli.command,
            Some(Commands::Snapshot {
                output: Some(PathBuf::from("/tmp/out"))
            })
        );
    }

    #[test]
    fn test_unknown_sample_strategy_is_rejected() {
        assert!(Cli::try_parse_from(["depth-sample", "--sample", "corner"]).is_err());
    }
}
