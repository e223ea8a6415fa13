//! Console reporter for suite results
//!
//! One line per scenario with a status mark, then the failures grouped with
//! the step they stopped at.

use anyhow::Result;
use std::fmt::Write;

use crate::runner::{ScenarioResult, SuiteResults};

/// Console format reporter
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Format suite results for console output
    pub fn format(results: &SuiteResults) -> Result<String> {
        let mut output = String::new();

        writeln!(output)?;
        writeln!(output, "╔══════════════════════════════════════════════════════════════╗")?;
        writeln!(output, "║                    ROLE MATRIX RESULTS                       ║")?;
        writeln!(output, "╚══════════════════════════════════════════════════════════════╝")?;
        writeln!(output)?;

        writeln!(output, "Suite:     {}", results.suite_name)?;
        writeln!(output, "Base URL:  {}", results.base_url)?;
        writeln!(output, "Started:   {}", results.started_at)?;
        writeln!(output, "Duration:  {}ms", results.total_duration_ms)?;
        writeln!(output, "Sessions:  {} in parallel", results.parallel_sessions)?;
        writeln!(output)?;

        writeln!(output, "────────────────────────────────────────────────────────────────")?;
        for scenario in &results.scenario_results {
            Self::format_scenario(&mut output, scenario)?;
        }
        writeln!(output, "────────────────────────────────────────────────────────────────")?;

        let status = if results.passed { "PASSED" } else { "FAILED" };
        let status_symbol = if results.passed { "✓" } else { "✗" };
        writeln!(
            output,
            "Overall Status: {} {} ({} passed, {} failed)",
            status_symbol,
            status,
            results.passed_count(),
            results.failed_count()
        )?;

        let failed: Vec<_> = results
            .scenario_results
            .iter()
            .filter_map(|r| r.failure.as_ref().map(|f| (r, f)))
            .collect();
        if !failed.is_empty() {
            writeln!(output)?;
            writeln!(output, "Failures:")?;
            for (result, failure) in failed {
                let origin = if failure.timing { "timing" } else { "application" };
                writeln!(output, "  • {} at {} ({})", result.scenario_name, failure.step, origin)?;
                writeln!(output, "      {}", failure.message)?;
            }
        }

        writeln!(output)?;
        Ok(output)
    }

    fn format_scenario(output: &mut String, scenario: &ScenarioResult) -> Result<()> {
        let status = if scenario.passed { "✓" } else { "✗" };
        writeln!(
            output,
            "  {} {:<48} {:>7}ms",
            status, scenario.scenario_name, scenario.duration_ms
        )?;
        Ok(())
    }
}
