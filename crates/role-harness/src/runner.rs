//! Scenario planning and execution
//!
//! A plan is a flat list of independent scenarios derived from the
//! [`Matrix`]. Each scenario gets a fresh driver from the factory, runs its
//! steps strictly in order, and always ends by logging out. Scenarios never
//! share a browser context, so they run concurrently up to
//! `harness.parallel_sessions`.
//!
//! ```text
//! ┌──────────────┐    ┌─────────────────────────────────────────────┐
//! │ plan(matrix) │──▶ │ login ─▶ navigate ─▶ await ready ─▶ assert  │──▶ logout
//! └──────────────┘    └─────────────────────────────────────────────┘
//!                       one driver per scenario, `scenario_ms` budget
//! ```
//!
//! # Example
//!
//! ```no_run
//! use role_harness::config::Config;
//! use role_harness::driver::ChromeFactory;
//! use role_harness::matrix::Matrix;
//! use role_harness::runner::{plan, PlanFilter, ScenarioRunner};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_file("harness.toml")?.with_env_overrides();
//! let factory = ChromeFactory::launch(&config.harness).await?;
//! let scenarios = plan(Matrix::standard(), &PlanFilter::default());
//!
//! let runner = ScenarioRunner::new(factory, Matrix::standard());
//! let results = runner.run(&config, &scenarios).await;
//! println!("{} of {} passed", results.passed_count(), results.scenario_results.len());
//! # Ok(())
//! # }
//! ```

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

use crate::assertion::{RowField, SurfaceAssertions};
use crate::config::Config;
use crate::driver::{Driver, DriverFactory};
use crate::error::{ErrorKind, HarnessError, Result};
use crate::locator::{AriaRole, Locator, NameMatch};
use crate::matrix::{FeatureKey, Identity, Matrix, RoleName};
use crate::navigation::Navigator;
use crate::readiness::ReadinessProber;
use crate::session::{Session, SessionController};

/// What a scenario verifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Configured credentials reach the dashboard and can log out again
    LoginSmoke,
    /// The administrator sees the account with the right role and scoping,
    /// and the account itself can sign in
    AccountCheck { role: RoleName },
    /// The role's navigation shows exactly the permitted entries
    NavigationMatrix { role: RoleName },
    /// The role opens one feature and sees its expected surface
    FeatureSurface { role: RoleName, feature: FeatureKey },
}

impl ScenarioKind {
    pub fn class(&self) -> ScenarioClass {
        match self {
            ScenarioKind::LoginSmoke => ScenarioClass::Login,
            ScenarioKind::AccountCheck { .. } => ScenarioClass::Account,
            ScenarioKind::NavigationMatrix { .. } => ScenarioClass::Navigation,
            ScenarioKind::FeatureSurface { .. } => ScenarioClass::Surface,
        }
    }

    pub fn role(&self) -> Option<RoleName> {
        match self {
            ScenarioKind::LoginSmoke => None,
            ScenarioKind::AccountCheck { role }
            | ScenarioKind::NavigationMatrix { role }
            | ScenarioKind::FeatureSurface { role, .. } => Some(*role),
        }
    }

    pub fn feature(&self) -> Option<FeatureKey> {
        match self {
            ScenarioKind::FeatureSurface { feature, .. } => Some(*feature),
            _ => None,
        }
    }
}

/// Scenario kinds without their parameters, for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioClass {
    Login,
    Account,
    Navigation,
    Surface,
}

impl FromStr for ScenarioClass {
    type Err = HarnessError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "login" => Ok(ScenarioClass::Login),
            "account" => Ok(ScenarioClass::Account),
            "navigation" | "nav" => Ok(ScenarioClass::Navigation),
            "surface" => Ok(ScenarioClass::Surface),
            other => Err(HarnessError::Config(format!(
                "unknown scenario kind \"{}\" (expected login, account, navigation or surface)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(flatten)]
    pub kind: ScenarioKind,
}

impl Scenario {
    pub fn new(matrix: &Matrix, kind: ScenarioKind) -> Self {
        let name = match kind {
            ScenarioKind::LoginSmoke => "Login smoke".to_string(),
            ScenarioKind::AccountCheck { role } => format!("{}: account", role),
            ScenarioKind::NavigationMatrix { role } => format!("{}: navigation", role),
            ScenarioKind::FeatureSurface { role, feature } => {
                let label = matrix
                    .feature(feature)
                    .map(|f| f.nav_label.to_string())
                    .unwrap_or_else(|_| feature.to_string());
                format!("{}: {}", role, label)
            }
        };
        Self { name, kind }
    }
}

/// Restricts a plan; an empty list places no restriction
#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    pub roles: Vec<RoleName>,
    pub features: Vec<FeatureKey>,
    pub kinds: Vec<ScenarioClass>,
}

impl PlanFilter {
    pub fn matches(&self, kind: &ScenarioKind) -> bool {
        let role_ok = match kind.role() {
            Some(role) => self.roles.is_empty() || self.roles.contains(&role),
            None => self.roles.is_empty(),
        };
        let feature_ok = match kind.feature() {
            Some(feature) => self.features.is_empty() || self.features.contains(&feature),
            None => self.features.is_empty(),
        };
        let kind_ok = self.kinds.is_empty() || self.kinds.contains(&kind.class());
        role_ok && feature_ok && kind_ok
    }
}

/// Every scenario the matrix implies, minus what the filter excludes
///
/// Order: login smoke, then per role its account check, navigation check
/// and one surface check per permitted feature in menu order.
pub fn plan(matrix: &Matrix, filter: &PlanFilter) -> Vec<Scenario> {
    let mut kinds = vec![ScenarioKind::LoginSmoke];
    for role in matrix.roles() {
        kinds.push(ScenarioKind::AccountCheck { role: role.name });
        kinds.push(ScenarioKind::NavigationMatrix { role: role.name });
        for feature in matrix.features() {
            if role.has_any(&feature.gated_by) {
                kinds.push(ScenarioKind::FeatureSurface {
                    role: role.name,
                    feature: feature.key,
                });
            }
        }
    }

    kinds
        .into_iter()
        .filter(|kind| filter.matches(kind))
        .map(|kind| Scenario::new(matrix, kind))
        .collect()
}

/// Step a scenario was in when it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Setup,
    Login,
    Navigate,
    AwaitReady,
    Assert,
    VerifyAccount,
    Logout,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Setup => "setup",
            Step::Login => "login",
            Step::Navigate => "navigate",
            Step::AwaitReady => "await-ready",
            Step::Assert => "assert",
            Step::VerifyAccount => "verify-account",
            Step::Logout => "logout",
        };
        f.write_str(s)
    }
}

/// Why a scenario failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFailure {
    pub role: Option<RoleName>,
    pub feature: Option<FeatureKey>,
    pub step: Step,
    pub kind: ErrorKind,
    /// Harness deadline rather than an application defect
    pub timing: bool,
    pub message: String,
}

/// Outcome of one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub scenario: ScenarioKind,
    pub passed: bool,
    pub duration_ms: u64,
    pub failure: Option<ScenarioFailure>,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResults {
    pub suite_name: String,
    pub base_url: String,
    pub parallel_sessions: u32,
    /// Results in plan order
    pub scenario_results: Vec<ScenarioResult>,
    pub total_duration_ms: u64,
    pub passed: bool,
    /// One line per failed scenario
    pub failures: Vec<String>,
    pub started_at: String,
}

impl SuiteResults {
    pub fn passed_count(&self) -> usize {
        self.scenario_results.iter().filter(|r| r.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.scenario_results.len() - self.passed_count()
    }
}

/// Last step a scenario entered, readable after its future is dropped
#[derive(Debug)]
struct Progress(Mutex<Step>);

impl Progress {
    fn new() -> Self {
        Self(Mutex::new(Step::Setup))
    }

    fn enter(&self, step: Step) {
        if let Ok(mut current) = self.0.lock() {
            *current = step;
        }
    }

    fn current(&self) -> Step {
        self.0.lock().map(|s| *s).unwrap_or(Step::Setup)
    }
}

/// Runs scenarios against drivers from `F`
pub struct ScenarioRunner<'m, F: DriverFactory> {
    factory: F,
    matrix: &'m Matrix,
}

impl<'m, F: DriverFactory> ScenarioRunner<'m, F> {
    pub fn new(factory: F, matrix: &'m Matrix) -> Self {
        Self { factory, matrix }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Give the factory back once the run is over
    pub fn into_factory(self) -> F {
        self.factory
    }

    /// Run every scenario and collect the results
    ///
    /// A failing scenario never stops the others.
    #[instrument(skip(self, config, scenarios), fields(suite = %config.harness.name))]
    pub async fn run(&self, config: &Config, scenarios: &[Scenario]) -> SuiteResults {
        let start_time = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();
        let parallel = config.harness.parallel_sessions.max(1) as usize;

        info!(
            "Starting suite '{}' with {} scenarios, {} at a time",
            config.harness.name,
            scenarios.len(),
            parallel
        );

        let semaphore = Arc::new(Semaphore::new(parallel));
        let scenario_futures: Vec<_> = scenarios
            .iter()
            .enumerate()
            .map(|(index, scenario)| {
                let sem = semaphore.clone();
                async move {
                    let _permit = sem.acquire().await.ok();
                    (index, self.run_scenario(config, scenario).await)
                }
            })
            .collect();

        let mut indexed: Vec<(usize, ScenarioResult)> = stream::iter(scenario_futures)
            .buffer_unordered(parallel)
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);
        let scenario_results: Vec<ScenarioResult> =
            indexed.into_iter().map(|(_, result)| result).collect();

        let failures: Vec<String> = scenario_results
            .iter()
            .filter_map(|r| {
                r.failure.as_ref().map(|f| {
                    format!("{} [{}]: {}", r.scenario_name, f.step, f.message)
                })
            })
            .collect();

        let results = SuiteResults {
            suite_name: config.harness.name.clone(),
            base_url: config.harness.base_url.clone(),
            parallel_sessions: parallel as u32,
            passed: failures.is_empty(),
            scenario_results,
            total_duration_ms: start_time.elapsed().as_millis() as u64,
            failures,
            started_at,
        };

        if results.passed {
            info!(
                "Suite '{}' passed in {}ms",
                results.suite_name, results.total_duration_ms
            );
        } else {
            warn!(
                "Suite '{}' completed with {} failures",
                results.suite_name,
                results.failures.len()
            );
        }
        results
    }

    /// Run one scenario in a fresh driver, bounded by `timeouts.scenario_ms`
    #[instrument(skip(self, config, scenario), fields(scenario = %scenario.name))]
    pub async fn run_scenario(&self, config: &Config, scenario: &Scenario) -> ScenarioResult {
        let start_time = Instant::now();
        let progress = Progress::new();

        let outcome = match self.factory.open().await {
            Ok(driver) => {
                let budget = config.timeouts.scenario();
                let outcome = match timeout(
                    budget,
                    self.execute(&driver, config, scenario.kind, &progress),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(HarnessError::ScenarioTimeout(budget)),
                };
                if let Err(e) = self.factory.close(driver).await {
                    warn!("Failed to close driver: {}", e);
                }
                outcome
            }
            Err(e) => Err(e),
        };

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let failure = match outcome {
            Ok(()) => {
                info!("Scenario '{}' passed in {}ms", scenario.name, duration_ms);
                None
            }
            Err(e) => {
                let step = progress.current();
                error!("Scenario '{}' failed at {}: {}", scenario.name, step, e);
                Some(ScenarioFailure {
                    role: scenario.kind.role(),
                    feature: scenario.kind.feature(),
                    step,
                    kind: e.kind(),
                    timing: e.is_timing(),
                    message: e.to_string(),
                })
            }
        };

        ScenarioResult {
            scenario_name: scenario.name.clone(),
            scenario: scenario.kind,
            passed: failure.is_none(),
            duration_ms,
            failure,
        }
    }

    async fn execute<D: Driver>(
        &self,
        driver: &D,
        config: &Config,
        kind: ScenarioKind,
        progress: &Progress,
    ) -> Result<()> {
        match kind {
            ScenarioKind::LoginSmoke => {
                let identity = smoke_identity(self.matrix, config)?;
                self.sign_in_and_out(driver, config, &identity, progress).await
            }
            ScenarioKind::AccountCheck { role } => {
                self.account_check(driver, config, role, progress).await
            }
            ScenarioKind::NavigationMatrix { role } => {
                let identity = self.matrix.identity_for(role)?;
                let sessions = SessionController::new(driver, config);
                progress.enter(Step::Login);
                let mut session = sessions.login(identity).await?;

                progress.enter(Step::Assert);
                let outcome = SurfaceAssertions::new(driver, config)
                    .assert_navigation(&session, self.matrix)
                    .await;
                self.finish(&sessions, &mut session, outcome, progress).await
            }
            ScenarioKind::FeatureSurface { role, feature } => {
                let identity = self.matrix.identity_for(role)?;
                let area = self.matrix.feature(feature)?;
                let expected = self.matrix.expected_surfaces(role, feature)?;
                let hidden = self.matrix.hidden_surfaces(role, feature)?;
                let sessions = SessionController::new(driver, config);

                progress.enter(Step::Login);
                let mut session = sessions.login(identity).await?;

                let outcome = async {
                    progress.enter(Step::Navigate);
                    Navigator::new(driver, config).goto(&mut session, area).await?;
                    progress.enter(Step::AwaitReady);
                    let frame = ReadinessProber::new(driver, config)
                        .await_ready(&session, area)
                        .await?;
                    progress.enter(Step::Assert);
                    let assertions = SurfaceAssertions::new(driver, config);
                    assertions.assert_surface(&frame, &expected).await?;
                    assertions.assert_hidden(&frame, &hidden).await
                }
                .await;
                self.finish(&sessions, &mut session, outcome, progress).await
            }
        }
    }

    /// Log out whatever happened; the step stays on the failing one when the
    /// body already failed
    async fn finish<D: Driver>(
        &self,
        sessions: &SessionController<'_, D>,
        session: &mut Session,
        outcome: Result<()>,
        progress: &Progress,
    ) -> Result<()> {
        if outcome.is_ok() {
            progress.enter(Step::Logout);
        }
        sessions.release(session, outcome).await
    }

    async fn sign_in_and_out<D: Driver>(
        &self,
        driver: &D,
        config: &Config,
        identity: &Identity,
        progress: &Progress,
    ) -> Result<()> {
        let sessions = SessionController::new(driver, config);
        progress.enter(Step::Login);
        let mut session = sessions.login(identity).await?;
        self.finish(&sessions, &mut session, Ok(()), progress).await
    }

    #[instrument(skip(self, driver, config, progress))]
    async fn account_check<D: Driver>(
        &self,
        driver: &D,
        config: &Config,
        role: RoleName,
        progress: &Progress,
    ) -> Result<()> {
        let admin = self.matrix.identity_for(RoleName::Administrator)?;
        let target = self.matrix.identity_for(role)?;
        let sessions = SessionController::new(driver, config);

        progress.enter(Step::Login);
        let mut session = sessions.login(admin).await?;
        let outcome = self
            .verify_account(driver, config, &mut session, target, progress)
            .await;
        self.finish(&sessions, &mut session, outcome, progress).await?;

        // The account itself reaches the dashboard
        self.sign_in_and_out(driver, config, target, progress).await
    }

    async fn verify_account<D: Driver>(
        &self,
        driver: &D,
        config: &Config,
        session: &mut Session,
        target: &Identity,
        progress: &Progress,
    ) -> Result<()> {
        let users = self.matrix.feature(FeatureKey::Users)?;
        let role = self.matrix.role(target.role)?;
        let assertions = SurfaceAssertions::new(driver, config);

        progress.enter(Step::Navigate);
        Navigator::new(driver, config).goto(session, users).await?;

        progress.enter(Step::AwaitReady);
        let frame = ReadinessProber::new(driver, config)
            .await_ready(session, users)
            .await?;

        progress.enter(Step::VerifyAccount);
        let table = Locator::role(AriaRole::Table);
        assertions
            .search_rows(&frame, &users.landmark.locator(), &target.email)
            .await?;

        let field = if role.table_shows_role {
            RowField::Cell(NameMatch::exact(role.name.label()))
        } else {
            RowField::Column(1)
        };
        assertions
            .assert_row_field(&frame, &table, &target.email, &field)
            .await?;

        if role.org_unit_restricted {
            assertions
                .open_row_action(
                    &frame,
                    &table,
                    &target.email,
                    NameMatch::ContainsAny(vec!["Edit".to_string(), "edit".to_string()]),
                )
                .await?;
            assertions
                .assert_checked(&frame, &Locator::role(AriaRole::Checkbox).first())
                .await?;
            assertions
                .assert_all_checked(&frame, &Locator::role(AriaRole::Region).first())
                .await?;
            driver.press_key(frame.scope(), "Escape").await?;
        }

        info!("Verified account {} as {}", target.email, role.name);
        Ok(())
    }
}

/// Identity for the login smoke scenario: the configured credentials, shown
/// under the seeded account with that email, or the administrator's name
fn smoke_identity(matrix: &Matrix, config: &Config) -> Result<Identity> {
    let credentials = &config.credentials;
    let seeded = matrix
        .identities()
        .iter()
        .find(|i| i.email.eq_ignore_ascii_case(&credentials.email));
    let base = match seeded {
        Some(identity) => identity,
        None => matrix.identity_for(RoleName::Administrator)?,
    };

    let mut identity = base.clone();
    identity.email = credentials.email.clone();
    identity.password = credentials.password.clone();
    Ok(identity)
}
