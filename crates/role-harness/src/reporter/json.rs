//! JSON reporter for suite results

use crate::runner::SuiteResults;
use anyhow::Result;

/// JSON format reporter
pub struct JsonReporter;

impl JsonReporter {
    /// Format suite results as JSON
    ///
    /// # Arguments
    ///
    /// * `results` - The suite results to format
    /// * `pretty` - Whether to pretty-print the JSON
    pub fn format(results: &SuiteResults, pretty: bool) -> Result<String> {
        let output = if pretty {
            serde_json::to_string_pretty(results)?
        } else {
            serde_json::to_string(results)?
        };
        Ok(output)
    }
}
