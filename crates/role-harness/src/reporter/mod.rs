//! Suite result reporting
//!
//! # Output Formats
//!
//! - **JSON**: Machine-readable format for CI/CD integration
//! - **Console**: One line per scenario, then failures with their step
//!
//! # Example
//!
//! ```no_run
//! use role_harness::reporter::{Reporter, OutputFormat};
//! use role_harness::runner::SuiteResults;
//!
//! # fn example(results: SuiteResults) -> anyhow::Result<()> {
//! let reporter = Reporter::new(OutputFormat::Console);
//! reporter.report(&results)?;
//!
//! // Or write to a file
//! Reporter::new(OutputFormat::Json)
//!     .write_to_file(&results, "results.json")?;
//! # Ok(())
//! # }
//! ```

mod console;
mod json;

use anyhow::Result;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::HarnessError;
use crate::runner::SuiteResults;

pub use console::ConsoleReporter;
pub use json::JsonReporter;

/// Output format for suite results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// JSON format for machine parsing
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Console output
    #[default]
    Console,
}

impl FromStr for OutputFormat {
    type Err = HarnessError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "pretty" => Ok(OutputFormat::JsonPretty),
            "console" | "text" => Ok(OutputFormat::Console),
            other => Err(HarnessError::Config(format!(
                "unknown output format \"{}\" (expected console, json or json-pretty)",
                other
            ))),
        }
    }
}

/// Reporter for suite results
pub struct Reporter {
    format: OutputFormat,
}

impl Reporter {
    /// Create a new reporter with the specified output format
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Report results to stdout
    pub fn report(&self, results: &SuiteResults) -> Result<()> {
        let output = self.format_results(results)?;
        print!("{}", output);
        io::stdout().flush()?;
        Ok(())
    }

    /// Write results to a file
    pub fn write_to_file<P: AsRef<Path>>(&self, results: &SuiteResults, path: P) -> Result<()> {
        let output = self.format_results(results)?;
        fs::write(path, output)?;
        Ok(())
    }

    /// Format results as a string
    pub fn format_results(&self, results: &SuiteResults) -> Result<String> {
        match self.format {
            OutputFormat::Json => JsonReporter::format(results, false),
            OutputFormat::JsonPretty => JsonReporter::format(results, true),
            OutputFormat::Console => ConsoleReporter::format(results),
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}
