use clap::Parser;
use std::path::PathBuf;

use crate::config::{DEFAULT_BUFFER_SIZE, ImporterConfig};

#[derive(Parser, Debug)]
#[command(name = "update-importer")]
#[command(version)]
#[command(about = "Import a local OTA update package for installation", long_about = None)]
#[command(after_help = "Examples:\n  \
  update-importer ota.zip -d /data/updates --verify-cmd ./verify-ota\n  \
  update-importer --inspect ota.zip          show the package's build metadata")]
pub struct Cli {
    /// Update package (ZIP)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Directory the package is imported into
    #[arg(short = 'd', long = "download-dir", value_name = "DIR", default_value = ".")]
    pub download_dir: PathBuf,

    /// Program that verifies the package; it receives the path as last argument
    #[arg(long, value_name = "PROG", required_unless_present = "inspect")]
    pub verify_cmd: Option<String>,

    /// Extra argument for the verify program (repeatable)
    #[arg(long = "verify-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub verify_args: Vec<String>,

    /// Copy buffer size in bytes
    #[arg(short = 'b', long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Print the package metadata and exit without importing
    #[arg(short = 'i', long)]
    pub inspect: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn importer_config(&self) -> ImporterConfig {
        ImporterConfig::new(&self.download_dir).with_buffer_size(self.buffer_size)
    }

    /// Default log filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match self.quiet {
            0 => "info",
            1 => "warn",
            _ => "error",
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }
}
