//! `cwatch check`: validate the configuration.

use std::io::Write;
use std::path::{Path, PathBuf};

use cwatch_config::MetricsConfig;

use crate::cli::CheckArgs;
use crate::error::Result;
use crate::output::{ConfigSummary, OutputFormat};

/// Loads the metrics file and lists what would be tracked.
#[derive(Debug, Clone)]
pub struct CheckCommand {
    config_path: PathBuf,
}

impl CheckCommand {
    /// Create a new check command.
    #[must_use]
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Execute the command.
    ///
    /// # Errors
    ///
    /// Returns the configuration error, listing every problem, if the file
    /// is missing or invalid.
    pub fn execute<W: Write>(&self, out: &mut W, args: &CheckArgs) -> Result<()> {
        let config = MetricsConfig::from_file(&self.config_path)?;
        OutputFormat::new(args.format).write(out, &ConfigSummary::new(&config))
    }
}
