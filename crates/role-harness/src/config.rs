//! Configuration parsing for harness runs
//!
//! This module provides TOML-based configuration for the application under
//! test, the deadlines applied at every suspension point, per-feature frame
//! readiness overrides, and the credentials used by the login smoke scenario.
//! Environment variables override the file after parsing.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::matrix::FeatureKey;
use crate::wait::PollPolicy;

/// Environment variable overriding the smoke login email
pub const ENV_LOGIN_USERNAME: &str = "LOGIN_USERNAME";
/// Environment variable overriding the smoke login password
pub const ENV_LOGIN_PASSWORD: &str = "LOGIN_PASSWORD";
/// Environment variable overriding the application base URL
pub const ENV_BASE_URL: &str = "E2E_BASE_URL";

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Target application and browser settings
    #[serde(default)]
    pub harness: HarnessConfig,
    /// Deadlines for every bounded wait
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    /// Per-feature overrides, keyed by feature key
    #[serde(default)]
    pub features: BTreeMap<FeatureKey, FeatureOverride>,
    /// Credentials for the login smoke scenario
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML is malformed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use role_harness::config::Config;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = Config::from_file("harness.toml")?.with_env_overrides();
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// ```
    /// use role_harness::config::Config;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = Config::from_str(r#"
    ///     [harness]
    ///     base_url = "https://packtrac.example.com"
    /// "#)?;
    /// assert_eq!(config.harness.parallel_sessions, 1);
    /// # Ok(())
    /// # }
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// Apply `LOGIN_USERNAME`, `LOGIN_PASSWORD` and `E2E_BASE_URL` from the
    /// process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup; empty values are ignored
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(email) = lookup(ENV_LOGIN_USERNAME) {
            self.credentials.email = email;
        }
        if let Some(password) = lookup(ENV_LOGIN_PASSWORD) {
            self.credentials.password = password;
        }
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.harness.base_url = base_url;
        }
        self
    }

    /// Readiness deadline for a feature: config override, then the catalog
    /// default, then `timeouts.frame_ready_ms`
    pub fn frame_ready_timeout(&self, key: FeatureKey, catalog_default: Option<Duration>) -> Duration {
        self.features
            .get(&key)
            .and_then(|f| f.frame_ready_ms)
            .map(Duration::from_millis)
            .or(catalog_default)
            .unwrap_or_else(|| self.timeouts.frame_ready())
    }
}

/// Target application and browser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Name of the suite, shown in reports
    #[serde(default = "default_name")]
    pub name: String,
    /// Base URL of the shell application
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Number of scenarios run concurrently, each in its own browser context (default: 1)
    #[serde(default = "default_parallel_sessions")]
    pub parallel_sessions: u32,
    /// Run Chrome without a window (default: true)
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Explicit Chrome executable; auto-detected when absent
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            base_url: default_base_url(),
            parallel_sessions: default_parallel_sessions(),
            headless: default_headless(),
            chrome_executable: None,
        }
    }
}

fn default_name() -> String {
    "Role matrix".to_string()
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_parallel_sessions() -> u32 {
    1
}

fn default_headless() -> bool {
    true
}

/// Deadlines, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Post-submit wait for the dashboard URL
    pub login_ms: u64,
    /// Wait for each logout step
    pub logout_ms: u64,
    /// Wait for the URL after clicking a navigation entry
    pub navigation_ms: u64,
    /// Wait for a control to become clickable
    pub interactable_ms: u64,
    /// Wait for an expected element inside a ready frame
    pub element_ms: u64,
    /// Default frame readiness deadline
    pub frame_ready_ms: u64,
    /// Overall deadline for one scenario
    pub scenario_ms: u64,
    /// First polling delay
    pub poll_initial_ms: u64,
    /// Polling delay cap
    pub poll_max_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            login_ms: 10_000,
            logout_ms: 5_000,
            navigation_ms: 10_000,
            interactable_ms: 5_000,
            element_ms: 5_000,
            frame_ready_ms: 10_000,
            scenario_ms: 60_000,
            poll_initial_ms: 100,
            poll_max_ms: 1_000,
        }
    }
}

impl TimeoutsConfig {
    pub fn login(&self) -> Duration {
        Duration::from_millis(self.login_ms)
    }

    pub fn logout(&self) -> Duration {
        Duration::from_millis(self.logout_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn interactable(&self) -> Duration {
        Duration::from_millis(self.interactable_ms)
    }

    pub fn element(&self) -> Duration {
        Duration::from_millis(self.element_ms)
    }

    pub fn frame_ready(&self) -> Duration {
        Duration::from_millis(self.frame_ready_ms)
    }

    pub fn scenario(&self) -> Duration {
        Duration::from_millis(self.scenario_ms)
    }

    /// Polling cadence shared by every wait
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_millis(self.poll_initial_ms),
            Duration::from_millis(self.poll_max_ms),
        )
    }
}

/// Per-feature settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FeatureOverride {
    /// Readiness deadline for this feature's frame
    pub frame_ready_ms: Option<u64>,
}

/// Credentials for the login smoke scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_email")]
    pub email: String,
    #[serde(default = "default_password")]
    pub password: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            email: default_email(),
            password: default_password(),
        }
    }
}

fn default_email() -> String {
    "admin@example.com".to_string()
}

fn default_password() -> String {
    "admin".to_string()
}
