//! Session Controller
//!
//! Logs an identity in through the shell's login form and out again through
//! the account menu. A scenario owns exactly one [`Session`] at a time and
//! must end with it logged out, whatever happened in between; see
//! [`SessionController::release`].

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::driver::{wait_interactable, wait_url, Driver, Scope};
use crate::error::{HarnessError, Result};
use crate::locator::{AriaRole, Locator, NameMatch};
use crate::matrix::Identity;

lazy_static! {
    static ref DASHBOARD_URL: Regex = Regex::new(r"dashboard").unwrap();
    static ref LOGIN_URL: Regex = Regex::new(r"login").unwrap();
}

/// An authenticated browser session for one identity
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub identity: Identity,
    pub authenticated: bool,
    pub current_url: String,
}

impl Session {
    /// The control that opens the account menu: the first button whose name
    /// mentions the signed-in user's display name or role
    pub fn account_control(&self) -> Locator {
        Locator::role_named(
            AriaRole::Button,
            NameMatch::ContainsAny(vec![
                self.identity.display_name.clone(),
                self.identity.role.label().to_string(),
            ]),
        )
        .first()
    }
}

fn email_input() -> Locator {
    Locator::css(r#"input[type="email"]"#)
}

fn password_input() -> Locator {
    Locator::css(r#"input[type="password"]"#)
}

fn submit_button() -> Locator {
    Locator::css(r#"button[type="submit"]"#)
}

fn logout_button() -> Locator {
    Locator::exact(AriaRole::Button, "Logout")
}

pub struct SessionController<'a, D: Driver + ?Sized> {
    driver: &'a D,
    config: &'a Config,
}

impl<'a, D: Driver + ?Sized> SessionController<'a, D> {
    pub fn new(driver: &'a D, config: &'a Config) -> Self {
        Self { driver, config }
    }

    /// Sign in and wait for the dashboard
    ///
    /// # Errors
    ///
    /// [`HarnessError::Authentication`] when the login form never becomes
    /// usable or the dashboard does not appear within `timeouts.login_ms`.
    #[instrument(skip(self, identity), fields(email = %identity.email, role = %identity.role))]
    pub async fn login(&self, identity: &Identity) -> Result<Session> {
        let timeouts = &self.config.timeouts;
        let policy = timeouts.poll_policy();
        let page = Scope::Page;

        self.driver.open(&self.config.harness.base_url).await?;

        if !wait_interactable(self.driver, &page, &email_input(), timeouts.login(), policy).await? {
            return Err(self.authentication_error(identity).await);
        }

        let filled = self.driver.fill(&page, &email_input(), &identity.email).await?
            && self
                .driver
                .fill(&page, &password_input(), &identity.password)
                .await?
            && self.driver.click(&page, &submit_button()).await?;
        if !filled {
            return Err(self.authentication_error(identity).await);
        }

        match wait_url(self.driver, &DASHBOARD_URL, timeouts.login(), policy).await? {
            Some(url) => {
                info!("Signed in as {}", identity.email);
                Ok(Session {
                    identity: identity.clone(),
                    authenticated: true,
                    current_url: url,
                })
            }
            None => Err(self.authentication_error(identity).await),
        }
    }

    async fn authentication_error(&self, identity: &Identity) -> HarnessError {
        HarnessError::Authentication {
            email: identity.email.clone(),
            waited: self.config.timeouts.login(),
            last_url: self.driver.current_url().await.unwrap_or_default(),
        }
    }

    /// Sign out through the account menu and wait for the login page
    ///
    /// # Errors
    ///
    /// [`HarnessError::Logout`] naming the step that did not complete.
    #[instrument(skip(self, session), fields(email = %session.identity.email))]
    pub async fn logout(&self, session: &mut Session) -> Result<()> {
        let timeouts = &self.config.timeouts;
        let policy = timeouts.poll_policy();
        let page = Scope::Page;
        let email = session.identity.email.clone();
        let failed = |reason: String| HarnessError::Logout {
            identity: email.clone(),
            reason,
        };

        let account = session.account_control();
        if !wait_interactable(self.driver, &page, &account, timeouts.interactable(), policy).await?
            || !self.driver.click(&page, &account).await?
        {
            return Err(failed(format!(
                "{} was not clickable within {:?}",
                account,
                timeouts.interactable()
            )));
        }
        debug!("Opened account menu");

        let logout = logout_button();
        if !wait_interactable(self.driver, &page, &logout, timeouts.logout(), policy).await?
            || !self.driver.click(&page, &logout).await?
        {
            return Err(failed(format!(
                "{} was not clickable within {:?}",
                logout,
                timeouts.logout()
            )));
        }

        match wait_url(self.driver, &LOGIN_URL, timeouts.logout(), policy).await? {
            Some(url) => {
                session.authenticated = false;
                session.current_url = url;
                info!("Signed out {}", session.identity.email);
                Ok(())
            }
            None => {
                let last = self.driver.current_url().await.unwrap_or_default();
                Err(failed(format!(
                    "login page did not appear within {:?} (last url: {})",
                    timeouts.logout(),
                    last
                )))
            }
        }
    }

    /// Log the session out and combine the result with the scenario's outcome
    ///
    /// The logout always runs. An earlier failure wins over a logout failure,
    /// which is then only logged.
    pub async fn release<T>(&self, session: &mut Session, outcome: Result<T>) -> Result<T> {
        let logout = self.logout(session).await;
        match (outcome, logout) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(logout_err)) => {
                warn!("Logout after failure also failed: {}", logout_err);
                Err(e)
            }
        }
    }
}
