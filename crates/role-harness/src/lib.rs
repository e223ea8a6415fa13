//! Role and permission verification harness
//!
//! Drives a real browser through a web shell that composes independently
//! deployed micro-frontends in `<iframe>`s, and verifies for every role that
//! exactly the permitted surfaces show up.
//!
//! # Features
//!
//! - **Session control**: login through the shell's form, logout through the
//!   account menu, always released at the end of a scenario
//! - **Navigation**: feature areas reached only by clicking navigation links
//! - **Frame readiness**: polling with backoff and a single Retry recovery
//! - **Surface assertions**: exact-name element checks scoped to one frame
//! - **Role matrix**: expected navigation and surfaces per role, checked for
//!   presence and absence
//! - **Isolation**: every scenario runs in its own browser context, so
//!   scenarios run concurrently
//!
//! # Example
//!
//! ```no_run
//! use role_harness::{Config, Matrix, ChromeFactory};
//! use role_harness::runner::{plan, PlanFilter, ScenarioRunner};
//! use role_harness::reporter::{Reporter, OutputFormat};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_file("harness.toml")?.with_env_overrides();
//! let matrix = Matrix::standard();
//! matrix.validate()?;
//!
//! let factory = ChromeFactory::launch(&config.harness).await?;
//! let runner = ScenarioRunner::new(factory, matrix);
//! let results = runner.run(&config, &plan(matrix, &PlanFilter::default())).await;
//!
//! Reporter::new(OutputFormat::Console).report(&results)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [harness]
//! name = "Role matrix"
//! base_url = "http://localhost:3000"
//! parallel_sessions = 4
//!
//! [timeouts]
//! frame_ready_ms = 10000
//!
//! [features.reports]
//! frame_ready_ms = 8000
//! ```
//!
//! `LOGIN_USERNAME`, `LOGIN_PASSWORD` and `E2E_BASE_URL` override the file.

pub mod assertion;
pub mod config;
pub mod driver;
pub mod error;
pub mod locator;
pub mod matrix;
pub mod navigation;
pub mod readiness;
pub mod reporter;
pub mod runner;
pub mod session;
pub mod wait;

pub use config::Config;
pub use driver::{ChromeFactory, Driver, DriverFactory, Scope};
pub use error::{ErrorKind, HarnessError, Result};
pub use matrix::{FeatureKey, Matrix, Permission, RoleName};
pub use runner::{ScenarioRunner, SuiteResults};
