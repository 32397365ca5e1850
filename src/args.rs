use crate::config::{AnalysisConfig, DetectionMethod};
use crate::error::Error;
use crate::results_log::DEFAULT_LOG_FILE;
use clap::{Parser, Subcommand};

fn method_parser(s: &str) -> std::result::Result<DetectionMethod, String> {
    s.parse::<DetectionMethod>().map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recovery scoring of equine accelerometer recordings.")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Recording to analyse; prompted for when omitted.
    #[arg(index = 1)]
    pub input: Option<String>,
    #[arg(long)]
    pub config: Option<String>,
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    pub log: String,
    #[arg(long, value_parser = method_parser)]
    pub method: Option<DetectionMethod>,
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Accept the first result without the recalibration prompt.
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print every row of the results log.
    Log {
        #[arg(long, default_value = DEFAULT_LOG_FILE)]
        file: String,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print where the default config file is looked up.
    Path,
}

impl Cli {
    /// Applies `--method` and `--threshold` on top of a loaded config.
    pub fn apply_overrides(&self, mut config: AnalysisConfig) -> crate::Result<AnalysisConfig> {
        if let Some(method) = self.method {
            config.method = method;
        }
        if let Some(threshold) = self.threshold {
            if !threshold.is_finite() {
                return Err(Error::InvalidConfig(format!("threshold must be finite, got {}", threshold)));
            }
            config = config.with_sensitivity(threshold);
        }
        config.validate()?;
        Ok(config)
    }
}
