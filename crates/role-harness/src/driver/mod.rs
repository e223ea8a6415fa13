//! Browser driver seam
//!
//! Components above this module (sessions, navigation, readiness, assertions)
//! only ever talk to a [`Driver`]: a single isolated browser page plus the
//! content frames embedded in it. [`DriverFactory`] hands out one fresh driver
//! per scenario so concurrently running scenarios never share cookies or
//! storage.
//!
//! The production implementation is [`chrome::ChromeFactory`]; tests script
//! the application with an in-memory fake.

pub mod chrome;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::error::Result;
use crate::locator::Locator;
use crate::wait::{poll_until, PollPolicy};

pub use chrome::{ChromeDriver, ChromeFactory};

/// Where a locator is evaluated
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The shell's own document
    Page,
    /// The document inside the `<iframe>` with this title
    Frame(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Page => f.write_str("page"),
            Scope::Frame(title) => write!(f, "frame \"{}\"", title),
        }
    }
}

/// One isolated browser page
#[async_trait]
pub trait Driver: Send + Sync {
    /// Load a URL in the page
    async fn open(&self, url: &str) -> Result<()>;

    /// Current location of the page
    async fn current_url(&self) -> Result<String>;

    /// Whether an `<iframe>` with this title is attached to the page
    async fn frame_attached(&self, title: &str) -> Result<bool>;

    /// Number of visible elements matching the locator
    async fn count(&self, scope: &Scope, locator: &Locator) -> Result<usize>;

    /// Whether the first visible match is enabled and not covered
    async fn is_interactable(&self, scope: &Scope, locator: &Locator) -> Result<bool>;

    /// Click the first visible match; `false` when nothing matched
    async fn click(&self, scope: &Scope, locator: &Locator) -> Result<bool>;

    /// Replace the value of the first visible match; `false` when nothing matched
    async fn fill(&self, scope: &Scope, locator: &Locator, text: &str) -> Result<bool>;

    /// Send a key press to the focused element of the scope
    async fn press_key(&self, scope: &Scope, key: &str) -> Result<()>;
}

/// Source of isolated drivers, one per scenario
#[async_trait]
pub trait DriverFactory: Send + Sync {
    type Driver: Driver;

    async fn open(&self) -> Result<Self::Driver>;

    /// Tear the driver down, discarding its cookies and storage
    async fn close(&self, driver: Self::Driver) -> Result<()>;
}

/// Wait until at least one match of `locator` is visible
pub async fn wait_visible<D: Driver + ?Sized>(
    driver: &D,
    scope: &Scope,
    locator: &Locator,
    limit: Duration,
    policy: PollPolicy,
) -> Result<bool> {
    let seen = poll_until(limit, policy, || async move {
        Ok((driver.count(scope, locator).await? > 0).then_some(()))
    })
    .await?;
    Ok(seen.is_some())
}

/// Wait until the first match of `locator` can take a click
pub async fn wait_interactable<D: Driver + ?Sized>(
    driver: &D,
    scope: &Scope,
    locator: &Locator,
    limit: Duration,
    policy: PollPolicy,
) -> Result<bool> {
    let ready = poll_until(limit, policy, || async move {
        Ok(driver.is_interactable(scope, locator).await?.then_some(()))
    })
    .await?;
    Ok(ready.is_some())
}

/// Wait until the page URL matches `pattern`; returns the matching URL
pub async fn wait_url<D: Driver + ?Sized>(
    driver: &D,
    pattern: &regex::Regex,
    limit: Duration,
    policy: PollPolicy,
) -> Result<Option<String>> {
    poll_until(limit, policy, || async move {
        let url = driver.current_url().await?;
        Ok(pattern.is_match(&url).then_some(url))
    })
    .await
}
