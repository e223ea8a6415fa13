//! Surface Assertion Engine
//!
//! Checks that a ready frame renders what a role must see. Elements are
//! resolved by role and exact accessible name, so "Product" never matches
//! "Product Supplier". Each element gets its own bounded wait; the first
//! miss fails the assertion with the frame and element named.

use std::fmt;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::driver::{wait_interactable, wait_visible, Driver, Scope};
use crate::error::{HarnessError, Result};
use crate::locator::{AriaRole, Locator, NameMatch};
use crate::matrix::{Matrix, StructuralElement};
use crate::navigation::Navigator;
use crate::readiness::FrameHandle;
use crate::session::Session;

/// Which part of a table row is checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowField {
    /// A cell whose accessible name matches
    Cell(NameMatch),
    /// The cell at this zero-based column is present
    Column(usize),
}

impl RowField {
    fn locator(&self) -> Locator {
        match self {
            RowField::Cell(name) => Locator::role_named(AriaRole::Cell, name.clone()),
            RowField::Column(index) => Locator::css(format!(
                ":scope > td:nth-child({}), :scope > [role=cell]:nth-child({})",
                index + 1,
                index + 1
            )),
        }
    }
}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowField::Cell(name) => write!(f, "cell {}", name),
            RowField::Column(index) => write!(f, "column {}", index),
        }
    }
}

pub struct SurfaceAssertions<'a, D: Driver + ?Sized> {
    driver: &'a D,
    config: &'a Config,
}

impl<'a, D: Driver + ?Sized> SurfaceAssertions<'a, D> {
    pub fn new(driver: &'a D, config: &'a Config) -> Self {
        Self { driver, config }
    }

    async fn visible(&self, scope: &Scope, locator: &Locator) -> Result<bool> {
        let timeouts = &self.config.timeouts;
        wait_visible(
            self.driver,
            scope,
            locator,
            timeouts.element(),
            timeouts.poll_policy(),
        )
        .await
    }

    /// Every expected element is visible inside the frame
    #[instrument(skip(self, frame, expected), fields(frame = %frame.title()))]
    pub async fn assert_surface(&self, frame: &FrameHandle, expected: &[StructuralElement]) -> Result<()> {
        for element in expected {
            if !self.visible(frame.scope(), &element.locator()).await? {
                return Err(HarnessError::assertion(
                    frame.to_string(),
                    element.to_string(),
                    format!("not visible within {:?}", self.config.timeouts.element()),
                ));
            }
            debug!("Found {}", element);
        }
        Ok(())
    }

    /// Exactly one row of `table` contains `row_key`, and that row shows `field`
    #[instrument(skip(self, frame, table), fields(frame = %frame.title()))]
    pub async fn assert_row_field(
        &self,
        frame: &FrameHandle,
        table: &Locator,
        row_key: &str,
        field: &RowField,
    ) -> Result<()> {
        let rows = table.clone().child(Locator::row_containing(row_key));
        if !self.visible(frame.scope(), &rows).await? {
            return Err(HarnessError::assertion(
                frame.to_string(),
                rows.to_string(),
                "no such row",
            ));
        }

        let matching = self.driver.count(frame.scope(), &rows).await?;
        if matching != 1 {
            return Err(HarnessError::assertion(
                frame.to_string(),
                format!("exactly one {}", rows),
                format!("{} rows match", matching),
            ));
        }

        let cell = rows.first().child(field.locator());
        if !self.visible(frame.scope(), &cell).await? {
            return Err(HarnessError::assertion(
                frame.to_string(),
                format!("{} in row containing {:?}", field, row_key),
                "not present",
            ));
        }
        Ok(())
    }

    /// The first match of `locator` is checked
    pub async fn assert_checked(&self, frame: &FrameHandle, locator: &Locator) -> Result<()> {
        let checked = locator.clone().checked();
        if !self.visible(frame.scope(), &checked).await? {
            return Err(HarnessError::assertion(
                frame.to_string(),
                checked.to_string(),
                "not checked",
            ));
        }
        Ok(())
    }

    /// `within` holds at least one checkbox and every one of them is checked
    pub async fn assert_all_checked(&self, frame: &FrameHandle, within: &Locator) -> Result<()> {
        let boxes = within.clone().child(Locator::role(AriaRole::Checkbox));
        if !self.visible(frame.scope(), &boxes).await? {
            return Err(HarnessError::assertion(
                frame.to_string(),
                boxes.to_string(),
                "no checkboxes",
            ));
        }

        let total = self.driver.count(frame.scope(), &boxes).await?;
        let checked = self.driver.count(frame.scope(), &boxes.clone().checked()).await?;
        if checked < total {
            return Err(HarnessError::assertion(
                frame.to_string(),
                format!("every {}", boxes),
                format!("{} of {} not checked", total - checked, total),
            ));
        }
        Ok(())
    }

    /// None of `elements` is rendered
    ///
    /// Checked without waiting, so call it after [`Self::assert_surface`]
    /// has seen the frame's expected elements.
    #[instrument(skip(self, frame, elements), fields(frame = %frame.title()))]
    pub async fn assert_hidden(&self, frame: &FrameHandle, elements: &[StructuralElement]) -> Result<()> {
        for element in elements {
            if self.driver.count(frame.scope(), &element.locator()).await? > 0 {
                return Err(HarnessError::assertion(
                    frame.to_string(),
                    format!("no {}", element),
                    "visible without the permission",
                ));
            }
        }
        Ok(())
    }

    /// The role's navigation shows every permitted entry and nothing else
    #[instrument(skip(self, session, matrix), fields(role = %session.identity.role))]
    pub async fn assert_navigation(&self, session: &Session, matrix: &Matrix) -> Result<()> {
        let role = session.identity.role;
        let expected = matrix.expected_navigation(role)?;

        for feature in matrix.features().iter().filter(|f| expected.contains(&f.key)) {
            if !self.visible(&Scope::Page, &feature.nav_link()).await? {
                return Err(HarnessError::assertion(
                    "navigation",
                    feature.nav_link().to_string(),
                    format!("missing for {}", role),
                ));
            }
        }

        let visible = Navigator::new(self.driver, self.config)
            .visible_entries(session, matrix.features())
            .await?;
        if let Some(extra) = visible.difference(&expected).next() {
            let feature = matrix.feature(*extra)?;
            return Err(HarnessError::assertion(
                "navigation",
                format!("no {}", feature.nav_link()),
                format!("visible to {}", role),
            ));
        }
        Ok(())
    }

    /// Type into the frame's search input
    pub async fn search_rows(&self, frame: &FrameHandle, input: &Locator, text: &str) -> Result<()> {
        let timeouts = &self.config.timeouts;
        let ready = wait_interactable(
            self.driver,
            frame.scope(),
            input,
            timeouts.element(),
            timeouts.poll_policy(),
        )
        .await?;
        if !ready || !self.driver.fill(frame.scope(), input, text).await? {
            return Err(HarnessError::assertion(
                frame.to_string(),
                input.to_string(),
                "not usable",
            ));
        }
        Ok(())
    }

    /// Click a button inside the row of `table` containing `row_key`
    pub async fn open_row_action(
        &self,
        frame: &FrameHandle,
        table: &Locator,
        row_key: &str,
        action: NameMatch,
    ) -> Result<()> {
        let timeouts = &self.config.timeouts;
        let button = table
            .clone()
            .child(Locator::row_containing(row_key))
            .first()
            .child(Locator::role_named(AriaRole::Button, action))
            .first();
        let ready = wait_interactable(
            self.driver,
            frame.scope(),
            &button,
            timeouts.element(),
            timeouts.poll_policy(),
        )
        .await?;
        if !ready || !self.driver.click(frame.scope(), &button).await? {
            return Err(HarnessError::assertion(
                frame.to_string(),
                button.to_string(),
                "not clickable",
            ));
        }
        Ok(())
    }
}
