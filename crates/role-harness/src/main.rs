//! Role harness binary
//!
//! Plans, runs and reports role/permission scenarios against a running shell.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use role_harness::config::Config;
use role_harness::driver::ChromeFactory;
use role_harness::matrix::{FeatureKey, Matrix, RoleName};
use role_harness::reporter::{OutputFormat, Reporter};
use role_harness::runner::{plan, PlanFilter, ScenarioClass, ScenarioRunner};

#[derive(Parser, Debug)]
#[command(name = "role-harness")]
#[command(version, about = "Verify what each role can see in the shell")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct Selection {
    /// Configuration file
    #[arg(short, long, default_value = "harness.toml")]
    config: PathBuf,

    /// Only scenarios for this role (label or slug), repeatable
    #[arg(long = "role")]
    roles: Vec<RoleName>,

    /// Only scenarios for this feature, repeatable
    #[arg(long = "feature")]
    features: Vec<FeatureKey>,

    /// Only scenarios of this kind: login, account, navigation, surface
    #[arg(long = "kind")]
    kinds: Vec<ScenarioClass>,
}

impl Selection {
    fn filter(&self) -> PlanFilter {
        PlanFilter {
            roles: self.roles.clone(),
            features: self.features.clone(),
            kinds: self.kinds.clone(),
        }
    }

    fn load_config(&self) -> anyhow::Result<Config> {
        let config = if self.config.exists() {
            Config::from_file(&self.config)?
        } else {
            tracing::warn!(
                "{} not found, using built-in defaults",
                self.config.display()
            );
            Config::default()
        };
        Ok(config.with_env_overrides())
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the planned scenarios in a browser
    Run {
        #[command(flatten)]
        selection: Selection,

        /// Output format: console, json or json-pretty
        #[arg(short, long, default_value = "console")]
        format: OutputFormat,

        /// Also write the report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Scenarios to run at once
        #[arg(long)]
        parallel: Option<u32>,
    },
    /// Print the scenarios a run would execute
    Plan {
        #[command(flatten)]
        selection: Selection,
    },
    /// Print each role's expected navigation
    Matrix,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Reports go to stdout, logs to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let matrix = Matrix::standard();
    matrix.validate()?;

    match args.command {
        Command::Run {
            selection,
            format,
            output,
            headed,
            parallel,
        } => {
            let mut config = selection.load_config()?;
            if headed {
                config.harness.headless = false;
            }
            if let Some(parallel) = parallel {
                config.harness.parallel_sessions = parallel;
            }

            let scenarios = plan(matrix, &selection.filter());
            if scenarios.is_empty() {
                anyhow::bail!("No scenarios match the given filters");
            }

            tracing::info!(
                "Running {} scenarios against {}",
                scenarios.len(),
                config.harness.base_url
            );
            let factory = ChromeFactory::launch(&config.harness)
                .await
                .context("Failed to launch browser")?;
            let runner = ScenarioRunner::new(factory, matrix);
            let results = runner.run(&config, &scenarios).await;
            if let Err(e) = runner.into_factory().shutdown().await {
                tracing::warn!("Browser shutdown failed: {}", e);
            }

            let reporter = Reporter::new(format);
            reporter.report(&results)?;
            if let Some(path) = output {
                reporter
                    .write_to_file(&results, &path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }

            if !results.passed {
                std::process::exit(1);
            }
        }
        Command::Plan { selection } => {
            for scenario in plan(matrix, &selection.filter()) {
                println!("{}", scenario.name);
            }
        }
        Command::Matrix => {
            for role in matrix.roles() {
                let visible = matrix.expected_navigation(role.name)?;
                println!("{}", role.name);
                for feature in matrix.features() {
                    let mark = if visible.contains(&feature.key) { "+" } else { "-" };
                    println!("  {} {}", mark, feature.nav_label);
                }
            }
        }
    }

    Ok(())
}
