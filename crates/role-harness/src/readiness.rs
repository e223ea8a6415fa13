//! Micro-frontend Readiness Prober
//!
//! A feature area renders inside an `<iframe>` that loads independently of
//! the shell. The prober polls the frame until the feature's landmark shows
//! up, recovering at most once through the frame's own "Retry" control when
//! the micro-frontend reports a load error.
//!
//! ```text
//!            ┌──────────┐  landmark visible   ┌───────┐
//!   start ──▶│ Loading  │────────────────────▶│ Ready │
//!            └──────────┘                     └───────┘
//!                 │  Retry visible
//!                 ▼
//!            ┌──────────┐  click Retry (once)
//!            │ Errored  │──────────────────▶ Loading, fresh deadline
//!            └──────────┘
//! ```
//!
//! Alerts alone do not make a frame Errored: a micro-frontend may show a
//! notice before its landmark renders. After the Retry click the error view
//! has to go away before another Errored observation counts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::driver::{Driver, Scope};
use crate::error::{HarnessError, Result};
use crate::locator::{AriaRole, Locator};
use crate::matrix::{FeatureArea, FeatureKey};
use crate::session::Session;
use crate::wait::poll_until;

/// What a content frame shows right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameState {
    Loading,
    Ready,
    Errored,
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FrameState::Loading => "loading",
            FrameState::Ready => "ready",
            FrameState::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// A content frame that reached [`FrameState::Ready`]
///
/// Queries made through [`FrameHandle::scope`] only see the frame's own
/// document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHandle {
    pub feature: FeatureKey,
    scope: Scope,
}

impl FrameHandle {
    pub fn new(feature: FeatureKey, title: impl Into<String>) -> Self {
        Self {
            feature,
            scope: Scope::Frame(title.into()),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn title(&self) -> &str {
        match &self.scope {
            Scope::Frame(title) => title,
            Scope::Page => "",
        }
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scope)
    }
}

pub fn retry_button() -> Locator {
    Locator::exact(AriaRole::Button, "Retry")
}

pub struct ReadinessProber<'a, D: Driver + ?Sized> {
    driver: &'a D,
    config: &'a Config,
}

impl<'a, D: Driver + ?Sized> ReadinessProber<'a, D> {
    pub fn new(driver: &'a D, config: &'a Config) -> Self {
        Self { driver, config }
    }

    /// Classify the feature's frame without waiting
    pub async fn observe(&self, feature: &FeatureArea) -> Result<FrameState> {
        if !self.driver.frame_attached(feature.frame_title).await? {
            return Ok(FrameState::Loading);
        }

        let scope = Scope::Frame(feature.frame_title.to_string());
        match self.classify(&scope, feature).await {
            Ok(state) => Ok(state),
            // The frame's document was swapped between queries
            Err(HarnessError::FrameDetached { .. }) => Ok(FrameState::Loading),
            Err(e) => Err(e),
        }
    }

    async fn classify(&self, scope: &Scope, feature: &FeatureArea) -> Result<FrameState> {
        if self.driver.count(scope, &feature.landmark.locator()).await? > 0 {
            return Ok(FrameState::Ready);
        }
        if self.driver.count(scope, &retry_button()).await? > 0 {
            return Ok(FrameState::Errored);
        }
        Ok(FrameState::Loading)
    }

    /// Poll until the frame leaves [`FrameState::Loading`] or `limit` passes
    async fn settle(&self, feature: &FeatureArea, limit: Duration) -> Result<Option<FrameState>> {
        let policy = self.config.timeouts.poll_policy();
        poll_until(limit, policy, || async move {
            let state = self.observe(feature).await?;
            debug!("Frame \"{}\" is {}", feature.frame_title, state);
            Ok((state != FrameState::Loading).then_some(state))
        })
        .await
    }

    /// Poll until the frame stops showing its error view; `false` when it
    /// still shows it after `limit`
    async fn clear_error(&self, feature: &FeatureArea, limit: Duration) -> Result<bool> {
        let policy = self.config.timeouts.poll_policy();
        let cleared = poll_until(limit, policy, || async move {
            let state = self.observe(feature).await?;
            Ok((state != FrameState::Errored).then_some(()))
        })
        .await?;
        Ok(cleared.is_some())
    }

    /// Wait for the feature's frame to become ready
    ///
    /// A frame that is already ready returns at once. On a load error the
    /// frame's Retry control is clicked once and the wait restarts with a
    /// fresh deadline.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::FrameTimeout`] when the deadline passes while loading
    /// - [`HarnessError::FrameLoad`] when the Retry control is gone before it
    ///   can be clicked, when the error view outlasts the fresh deadline, or
    ///   when the frame reports an error again after the retry
    #[instrument(skip(self, session, feature), fields(role = %session.identity.role, frame = %feature.frame_title))]
    pub async fn await_ready(&self, session: &Session, feature: &FeatureArea) -> Result<FrameHandle> {
        let limit = self
            .config
            .frame_ready_timeout(feature.key, feature.ready_timeout);
        let scope = Scope::Frame(feature.frame_title.to_string());
        let mut budget = limit;
        let mut retried = false;

        loop {
            match self.settle(feature, budget).await? {
                Some(FrameState::Ready) => {
                    info!("Frame \"{}\" ready", feature.frame_title);
                    return Ok(FrameHandle::new(feature.key, feature.frame_title));
                }
                Some(_) if retried => {
                    return Err(HarnessError::FrameLoad {
                        frame: feature.frame_title.to_string(),
                        retried: true,
                    });
                }
                Some(_) => {
                    let clicked = match self.driver.click(&scope, &retry_button()).await {
                        Ok(clicked) => clicked,
                        Err(HarnessError::FrameDetached { .. }) => false,
                        Err(e) => return Err(e),
                    };
                    if !clicked {
                        return Err(HarnessError::FrameLoad {
                            frame: feature.frame_title.to_string(),
                            retried: false,
                        });
                    }
                    warn!("Frame \"{}\" failed to load, retrying once", feature.frame_title);
                    retried = true;

                    let restarted = Instant::now();
                    if !self.clear_error(feature, limit).await? {
                        return Err(HarnessError::FrameLoad {
                            frame: feature.frame_title.to_string(),
                            retried: true,
                        });
                    }
                    budget = limit.saturating_sub(restarted.elapsed());
                }
                None => {
                    return Err(HarnessError::FrameTimeout {
                        frame: feature.frame_title.to_string(),
                        waited: limit,
                    });
                }
            }
        }
    }
}
