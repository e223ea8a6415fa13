//! Navigation Driver
//!
//! Moves a signed-in session between feature areas by clicking the shell's
//! navigation links, never by typing URLs, so a role that lacks a link
//! cannot reach the feature through this module.

use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::driver::{wait_url, wait_visible, Driver, Scope};
use crate::error::{HarnessError, Result};
use crate::locator::{AriaRole, Locator};
use crate::matrix::{FeatureArea, FeatureKey};
use crate::session::Session;

fn navigation_landmark() -> Locator {
    Locator::role(AriaRole::Navigation)
}

pub struct Navigator<'a, D: Driver + ?Sized> {
    driver: &'a D,
    config: &'a Config,
}

impl<'a, D: Driver + ?Sized> Navigator<'a, D> {
    pub fn new(driver: &'a D, config: &'a Config) -> Self {
        Self { driver, config }
    }

    /// Wait for the shell's navigation to render
    async fn await_shell(&self) -> Result<bool> {
        let timeouts = &self.config.timeouts;
        wait_visible(
            self.driver,
            &Scope::Page,
            &navigation_landmark(),
            timeouts.navigation(),
            timeouts.poll_policy(),
        )
        .await
    }

    /// Open a feature area through its navigation link
    ///
    /// # Errors
    ///
    /// - [`HarnessError::NavigationUnavailable`] when no link carries the
    ///   feature's exact label
    /// - [`HarnessError::NavigationTimeout`] when the URL never reaches the
    ///   feature's route
    #[instrument(skip(self, session, feature), fields(role = %session.identity.role, feature = %feature.key))]
    pub async fn goto(&self, session: &mut Session, feature: &FeatureArea) -> Result<()> {
        let timeouts = &self.config.timeouts;
        let policy = timeouts.poll_policy();
        let unavailable = || HarnessError::NavigationUnavailable {
            label: feature.nav_label.to_string(),
        };

        if !self.await_shell().await? {
            return Err(unavailable());
        }

        let link = feature.nav_link();
        if !wait_visible(self.driver, &Scope::Page, &link, timeouts.element(), policy).await? {
            return Err(unavailable());
        }
        if !self.driver.click(&Scope::Page, &link).await? {
            return Err(unavailable());
        }
        debug!("Clicked {}", link);

        match wait_url(self.driver, &feature.url_pattern, timeouts.navigation(), policy).await? {
            Some(url) => {
                info!("Opened {} at {}", feature.nav_label, url);
                session.current_url = url;
                Ok(())
            }
            None => {
                let last_url = self.driver.current_url().await?;
                session.current_url = last_url.clone();
                Err(HarnessError::NavigationTimeout {
                    label: feature.nav_label.to_string(),
                    pattern: feature.url_pattern.as_str().to_string(),
                    waited: timeouts.navigation(),
                    last_url,
                })
            }
        }
    }

    /// Catalog entries whose navigation link is currently rendered
    ///
    /// Waits for the shell's navigation first; an empty set means the shell
    /// rendered without any known entry.
    #[instrument(skip(self, session, catalog), fields(role = %session.identity.role))]
    pub async fn visible_entries(
        &self,
        session: &Session,
        catalog: &[FeatureArea],
    ) -> Result<BTreeSet<FeatureKey>> {
        if !self.await_shell().await? {
            return Err(HarnessError::NavigationUnavailable {
                label: navigation_landmark().to_string(),
            });
        }

        let mut visible = BTreeSet::new();
        for feature in catalog {
            if self.driver.count(&Scope::Page, &feature.nav_link()).await? > 0 {
                visible.insert(feature.key);
            }
        }
        debug!("Visible navigation entries: {:?}", visible);
        Ok(visible)
    }
}
