//! Scripted in-memory model of the shell and its micro-frontends
//!
//! `FakeShell` implements `Driver` by interpreting locators against a small
//! application model: a login form, per-account navigation, an account menu
//! and one content frame per feature whose load phases follow a script.

#![allow(dead_code)]

use async_trait::async_trait;
use role_harness::driver::{Driver, DriverFactory, Scope};
use role_harness::error::{HarnessError, Result};
use role_harness::locator::{AriaRole, Locator, NameMatch};
use role_harness::matrix::{identities, RoleName, StructuralElement};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "http://shell.test";

/// Load phase of a content frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No `<iframe>` yet
    Absent,
    Loading,
    Ready,
    /// Error view with a Retry control
    Errored,
    /// An alert is shown but neither the landmark nor Retry
    Notice,
    /// Attached, but every query hits a replaced document
    Detached,
}

#[derive(Debug, Clone)]
pub struct FakeAccount {
    pub password: String,
    pub display_name: String,
    pub nav: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FakeFrame {
    pub path: String,
    pub script: Vec<Phase>,
    pub retry_script: Vec<Phase>,
    /// Locator descriptions rendered for everyone
    pub elements: HashSet<String>,
    /// Locator descriptions rendered only for these emails
    pub restricted: HashMap<String, HashSet<String>>,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub email: String,
    pub role_cell: String,
    pub first_unit_checked: bool,
    /// Checkboxes inside the first org-unit region
    pub nested_units: Vec<bool>,
}

/// Everything a fresh browser context sees of the application
#[derive(Debug, Clone)]
pub struct FakeApp {
    pub accounts: HashMap<String, FakeAccount>,
    /// Navigation label to frame title
    pub nav_frames: HashMap<String, String>,
    pub frames: HashMap<String, FakeFrame>,
    pub users: Vec<UserRow>,
    pub dashboard_after_login: bool,
    pub url_follows_navigation: bool,
    pub logout_in_menu: bool,
    /// The Retry control is gone by the time it is clicked
    pub retry_goes_stale: bool,
    /// Interactability checks on the account control that report an overlay
    pub overlay_checks: usize,
}

fn describe(locator: Locator) -> String {
    locator.to_string()
}

fn frame(path: &str, elements: Vec<Locator>) -> FakeFrame {
    FakeFrame {
        path: path.to_string(),
        script: vec![Phase::Absent, Phase::Loading, Phase::Ready],
        retry_script: vec![Phase::Loading, Phase::Ready],
        elements: elements.into_iter().map(describe).collect(),
        restricted: HashMap::new(),
    }
}

impl FakeApp {
    /// The seeded application: six accounts, six feature frames
    pub fn standard() -> Self {
        let all = [
            "Packaging Items",
            "Products",
            "Specifications",
            "Packaging Suppliers",
            "User Management",
            "EPR Reports",
        ];
        let nav_for = |role: RoleName| -> Vec<String> {
            let labels: Vec<&str> = match role {
                RoleName::Administrator => all.to_vec(),
                RoleName::SustainabilityTeamMember => vec![
                    "Packaging Items",
                    "Products",
                    "Specifications",
                    "Packaging Suppliers",
                    "EPR Reports",
                ],
                RoleName::PackagingTechnologist | RoleName::QaTechnologist => vec![
                    "Packaging Items",
                    "Products",
                    "Specifications",
                    "Packaging Suppliers",
                ],
                RoleName::PackagingSpecialist => vec![
                    "Packaging Items",
                    "Products",
                    "Specifications",
                    "Packaging Suppliers",
                    "User Management",
                ],
                RoleName::Retailer => vec!["Products", "EPR Reports"],
            };
            labels.into_iter().map(String::from).collect()
        };

        let mut accounts = HashMap::new();
        let mut users = Vec::new();
        for identity in identities() {
            accounts.insert(
                identity.email.clone(),
                FakeAccount {
                    password: identity.password.clone(),
                    display_name: identity.display_name.clone(),
                    nav: nav_for(identity.role),
                },
            );
            let scoped = matches!(
                identity.role,
                RoleName::PackagingTechnologist
                    | RoleName::QaTechnologist
                    | RoleName::PackagingSpecialist
            );
            users.push(UserRow {
                email: identity.email.clone(),
                role_cell: if identity.role == RoleName::SustainabilityTeamMember {
                    "—".to_string()
                } else {
                    identity.role.label().to_string()
                },
                first_unit_checked: scoped,
                nested_units: if scoped { vec![true, true] } else { vec![false, false] },
            });
        }

        let table = || Locator::role(AriaRole::Table);
        let header = |name: &str| Locator::exact(AriaRole::ColumnHeader, name);
        let heading = |name: &str| Locator::exact(AriaRole::Heading, name);

        let mut frames = HashMap::new();
        frames.insert(
            "Packaging Items".to_string(),
            frame(
                "/packaging",
                vec![
                    table(),
                    header("Description"),
                    header("Material"),
                    header("Status"),
                ],
            ),
        );
        frames.insert("Products".to_string(), frame("/products", vec![table()]));
        frames.insert(
            "Specifications".to_string(),
            frame(
                "/specifications",
                vec![
                    heading("Specifications"),
                    Locator::text(NameMatch::exact("Total SKUs")),
                    table(),
                ],
            ),
        );
        frames.insert(
            "Suppliers".to_string(),
            frame(
                "/suppliers",
                vec![
                    heading("Suppliers"),
                    table(),
                    header("Name"),
                    header("DFFE Registration"),
                ],
            ),
        );
        frames.insert(
            "User Management".to_string(),
            frame(
                "/users",
                vec![
                    Locator::placeholder("Search users..."),
                    table(),
                    StructuralElement::row_action("Edit").locator(),
                ],
            ),
        );
        let mut reports = frame("/reports", vec![heading("EPR Reports")]);
        reports.restricted.insert(
            describe(heading("Sales Data")),
            ["admin@example.com", "retailer@packtrac.com"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        frames.insert("EPR Reports".to_string(), reports);

        let nav_frames = all
            .iter()
            .map(|label| {
                let title = if *label == "Packaging Suppliers" {
                    "Suppliers"
                } else {
                    *label
                };
                (label.to_string(), title.to_string())
            })
            .collect();

        Self {
            accounts,
            nav_frames,
            frames,
            users,
            dashboard_after_login: true,
            url_follows_navigation: true,
            logout_in_menu: true,
            retry_goes_stale: false,
            overlay_checks: 0,
        }
    }

    pub fn script_frame(mut self, title: &str, script: Vec<Phase>) -> Self {
        self.frames.get_mut(title).unwrap().script = script;
        self
    }

    pub fn script_retry(mut self, title: &str, script: Vec<Phase>) -> Self {
        self.frames.get_mut(title).unwrap().retry_script = script;
        self
    }

    pub fn frame_elements(mut self, title: &str, elements: Vec<Locator>) -> Self {
        self.frames.get_mut(title).unwrap().elements =
            elements.into_iter().map(describe).collect();
        self
    }

    /// Render a restricted element for one more account
    pub fn reveal(mut self, title: &str, locator: Locator, email: &str) -> Self {
        self.frames
            .get_mut(title)
            .unwrap()
            .restricted
            .entry(describe(locator))
            .or_default()
            .insert(email.to_string());
        self
    }

    pub fn nested_units(mut self, email: &str, units: Vec<bool>) -> Self {
        for row in self.users.iter_mut().filter(|r| r.email == email) {
            row.nested_units = units.clone();
        }
        self
    }

    pub fn grant_nav(mut self, email: &str, label: &str) -> Self {
        self.accounts
            .get_mut(email)
            .unwrap()
            .nav
            .push(label.to_string());
        self
    }

    pub fn revoke_nav(mut self, email: &str, label: &str) -> Self {
        self.accounts.get_mut(email).unwrap().nav.retain(|l| l != label);
        self
    }
}

#[derive(Debug)]
struct State {
    app: FakeApp,
    url: String,
    user: Option<String>,
    filled: HashMap<String, String>,
    menu_open: bool,
    overlay_checks: usize,
    frame: Option<String>,
    phases: VecDeque<Phase>,
    current: Phase,
    search: Option<String>,
    modal_row: Option<String>,
    clicks: Vec<String>,
    retries: usize,
}

/// One isolated page of the fake application
pub struct FakeShell {
    state: Mutex<State>,
}

impl FakeShell {
    pub fn new(app: FakeApp) -> Self {
        let overlay_checks = app.overlay_checks;
        Self {
            state: Mutex::new(State {
                app,
                url: "about:blank".to_string(),
                user: None,
                filled: HashMap::new(),
                menu_open: false,
                overlay_checks,
                frame: None,
                phases: VecDeque::new(),
                current: Phase::Absent,
                search: None,
                modal_row: None,
                clicks: Vec::new(),
                retries: 0,
            }),
        }
    }

    pub fn standard() -> Self {
        Self::new(FakeApp::standard())
    }

    pub fn url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    pub fn signed_in_as(&self) -> Option<String> {
        self.state.lock().unwrap().user.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn retries(&self) -> usize {
        self.state.lock().unwrap().retries
    }

    pub fn modal_open(&self) -> bool {
        self.state.lock().unwrap().modal_row.is_some()
    }
}

fn is_css(locator: &Locator, selector: &str) -> bool {
    matches!(locator, Locator::Css(s) if s == selector)
}

fn role_name<'l>(locator: &'l Locator, role: AriaRole) -> Option<&'l NameMatch> {
    match locator {
        Locator::Role {
            role: r,
            name: Some(name),
        } if *r == role => Some(name),
        _ => None,
    }
}

fn first_of(locator: &Locator) -> Option<&Locator> {
    match locator {
        Locator::Nth { inner, index: 0 } => Some(inner),
        _ => None,
    }
}

fn is_logout(locator: &Locator) -> bool {
    matches!(role_name(locator, AriaRole::Button), Some(NameMatch::Exact(n)) if n == "Logout")
}

fn is_retry(locator: &Locator) -> bool {
    matches!(role_name(locator, AriaRole::Button), Some(NameMatch::Exact(n)) if n == "Retry")
}

/// `table >> row containing key`
fn table_rows(locator: &Locator) -> Option<&str> {
    match locator {
        Locator::Within { parent, child } => match (parent.as_ref(), child.as_ref()) {
            (Locator::Role { role: AriaRole::Table, name: None }, Locator::RowContaining(key)) => {
                Some(key.as_str())
            }
            _ => None,
        },
        _ => None,
    }
}

impl State {
    fn on_login_page(&self) -> bool {
        self.user.is_none() && self.url.contains("/login")
    }

    fn account(&self) -> Option<&FakeAccount> {
        self.user.as_ref().and_then(|u| self.app.accounts.get(u))
    }

    fn visible_rows(&self, key: &str) -> Vec<&UserRow> {
        self.app
            .users
            .iter()
            .filter(|r| self.search.as_ref().map_or(true, |s| r.email.contains(s.as_str())))
            .filter(|r| r.email.contains(key))
            .collect()
    }

    fn count_page(&self, locator: &Locator) -> usize {
        if is_css(locator, r#"input[type="email"]"#)
            || is_css(locator, r#"input[type="password"]"#)
            || is_css(locator, r#"button[type="submit"]"#)
        {
            return self.on_login_page() as usize;
        }

        let Some(account) = self.account() else {
            return 0;
        };

        if matches!(locator, Locator::Role { role: AriaRole::Navigation, name: None }) {
            return 1;
        }
        if let Some(name) = role_name(locator, AriaRole::Link) {
            return account.nav.iter().filter(|l| name.matches(l)).count();
        }
        if let Some(name) = first_of(locator).and_then(|l| role_name(l, AriaRole::Button)) {
            return name.matches(&account.display_name) as usize;
        }
        if is_logout(locator) {
            return (self.menu_open && self.app.logout_in_menu) as usize;
        }
        0
    }

    fn count_frame(&self, title: &str, locator: &Locator) -> Result<usize> {
        if self.frame.as_deref() != Some(title) {
            return Err(HarnessError::FrameDetached {
                frame: title.to_string(),
            });
        }
        let frame = &self.app.frames[title];

        match self.current {
            Phase::Absent | Phase::Detached => Err(HarnessError::FrameDetached {
                frame: title.to_string(),
            }),
            Phase::Loading => Ok(0),
            Phase::Errored => Ok(is_retry(locator) as usize),
            Phase::Notice => Ok(is_css(locator, "[role=alert]") as usize),
            Phase::Ready => {
                let desc = locator.to_string();
                if frame.elements.contains(&desc) {
                    return Ok(1);
                }
                if let (Some(allowed), Some(user)) = (frame.restricted.get(&desc), &self.user) {
                    return Ok(allowed.contains(user) as usize);
                }
                Ok(self.count_users_table(locator))
            }
        }
    }

    fn count_users_table(&self, locator: &Locator) -> usize {
        if let Some(key) = table_rows(locator) {
            return self.visible_rows(key).len();
        }

        match locator {
            Locator::Nth { inner, index: 0 } => self.count_users_table(inner).min(1),
            Locator::Within { parent, child } => {
                let Some(key) = first_of(parent).and_then(table_rows) else {
                    return self.count_in_modal(locator);
                };
                let Some(row) = self.visible_rows(key).into_iter().next() else {
                    return 0;
                };
                if let Some(name) = role_name(child, AriaRole::Cell) {
                    return name.matches(&row.role_cell) as usize;
                }
                if matches!(child.as_ref(), Locator::Css(_)) {
                    return 1;
                }
                if let Some(name) = role_name(child, AriaRole::Button) {
                    return name.matches("Edit") as usize;
                }
                0
            }
            _ => self.count_in_modal(locator),
        }
    }

    fn count_in_modal(&self, locator: &Locator) -> usize {
        let Some(row) = self
            .modal_row
            .as_ref()
            .and_then(|email| self.app.users.iter().find(|r| &r.email == email))
        else {
            return 0;
        };
        let (inner, checked_only) = match locator {
            Locator::Checked(inner) => (inner.as_ref(), true),
            other => (other, false),
        };
        match inner {
            Locator::Nth { inner, index: 0 }
                if matches!(inner.as_ref(), Locator::Role { role: AriaRole::Checkbox, .. }) =>
            {
                if checked_only {
                    row.first_unit_checked as usize
                } else {
                    1
                }
            }
            Locator::Within { parent, child }
                if matches!(child.as_ref(), Locator::Role { role: AriaRole::Checkbox, .. })
                    && matches!(
                        first_of(parent),
                        Some(Locator::Role { role: AriaRole::Region, .. })
                    ) =>
            {
                row.nested_units
                    .iter()
                    .filter(|checked| !checked_only || **checked)
                    .count()
            }
            _ => 0,
        }
    }

    fn count(&self, scope: &Scope, locator: &Locator) -> Result<usize> {
        match scope {
            Scope::Page => Ok(self.count_page(locator)),
            Scope::Frame(title) => self.count_frame(title, locator),
        }
    }

    fn submit_login(&mut self) {
        let email = self
            .filled
            .get(r#"css input[type="email"]"#)
            .cloned()
            .unwrap_or_default();
        let password = self
            .filled
            .get(r#"css input[type="password"]"#)
            .cloned()
            .unwrap_or_default();
        let valid = self
            .app
            .accounts
            .get(&email)
            .map_or(false, |a| a.password == password);

        if !valid {
            self.url = format!("{}/login?error=invalid", BASE_URL);
        } else if self.app.dashboard_after_login {
            self.user = Some(email);
            self.url = format!("{}/dashboard", BASE_URL);
        } else {
            self.url = format!("{}/login?pending=1", BASE_URL);
        }
    }

    fn navigate(&mut self, label: &str) {
        let Some(title) = self.app.nav_frames.get(label).cloned() else {
            return;
        };
        let frame = &self.app.frames[&title];
        if self.app.url_follows_navigation {
            self.url = format!("{}{}", BASE_URL, frame.path);
        }
        self.phases = frame.script.iter().copied().collect();
        self.current = self.phases.front().copied().unwrap_or(Phase::Absent);
        self.frame = Some(title);
        self.search = None;
        self.modal_row = None;
    }

    fn sign_out(&mut self) {
        self.user = None;
        self.menu_open = false;
        self.frame = None;
        self.url = format!("{}/login", BASE_URL);
    }
}

#[async_trait]
impl Driver for FakeShell {
    async fn open(&self, _url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.url = if state.user.is_some() {
            format!("{}/dashboard", BASE_URL)
        } else {
            format!("{}/login", BASE_URL)
        };
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn frame_attached(&self, title: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.user.is_none() || state.frame.as_deref() != Some(title) {
            return Ok(false);
        }
        let phase = state.phases.front().copied().unwrap_or(Phase::Absent);
        if state.phases.len() > 1 {
            state.phases.pop_front();
        }
        state.current = phase;
        Ok(phase != Phase::Absent)
    }

    async fn count(&self, scope: &Scope, locator: &Locator) -> Result<usize> {
        self.state.lock().unwrap().count(scope, locator)
    }

    async fn is_interactable(&self, scope: &Scope, locator: &Locator) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.count(scope, locator)? == 0 {
            return Ok(false);
        }
        let account_control = matches!(scope, Scope::Page)
            && first_of(locator)
                .and_then(|l| role_name(l, AriaRole::Button))
                .is_some();
        if account_control && state.overlay_checks > 0 {
            state.overlay_checks -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    async fn click(&self, scope: &Scope, locator: &Locator) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.count(scope, locator)? == 0 {
            return Ok(false);
        }
        if matches!(scope, Scope::Frame(_)) && is_retry(locator) && state.app.retry_goes_stale {
            return Ok(false);
        }
        state.clicks.push(format!("{} {}", scope, locator));

        match scope {
            Scope::Page => {
                if is_css(locator, r#"button[type="submit"]"#) {
                    state.submit_login();
                } else if is_logout(locator) {
                    state.sign_out();
                } else if let Some(NameMatch::Exact(label)) = role_name(locator, AriaRole::Link) {
                    let label = label.clone();
                    state.navigate(&label);
                } else if first_of(locator).is_some() {
                    state.menu_open = true;
                }
            }
            Scope::Frame(title) => {
                if is_retry(locator) {
                    state.retries += 1;
                    let script = state.app.frames[title].retry_script.clone();
                    state.phases = script.into_iter().collect();
                    state.current = state.phases.front().copied().unwrap_or(Phase::Absent);
                } else if let Locator::Nth { inner, .. } = locator {
                    if let Locator::Within { parent, .. } = inner.as_ref() {
                        if let Some(key) = first_of(parent).and_then(table_rows) {
                            let email = state.visible_rows(key).first().map(|r| r.email.clone());
                            state.modal_row = email;
                        }
                    }
                }
            }
        }
        Ok(true)
    }

    async fn fill(&self, scope: &Scope, locator: &Locator, text: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.count(scope, locator)? == 0 {
            return Ok(false);
        }
        match scope {
            Scope::Page => {
                state.filled.insert(locator.to_string(), text.to_string());
            }
            Scope::Frame(_) => state.search = Some(text.to_string()),
        }
        Ok(true)
    }

    async fn press_key(&self, scope: &Scope, key: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if matches!(scope, Scope::Frame(_)) && key == "Escape" {
            state.modal_row = None;
        }
        Ok(())
    }
}

/// Hands out fresh fake pages and tracks how many are open at once
#[derive(Clone)]
pub struct FakeFactory {
    app: FakeApp,
    open: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
    closed_signed_in: Arc<AtomicUsize>,
}

impl FakeFactory {
    pub fn new(app: FakeApp) -> Self {
        Self {
            app,
            open: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicUsize::new(0)),
            closed_signed_in: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Most drivers open at the same time
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn open_now(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Drivers that were closed while still signed in
    pub fn closed_signed_in(&self) -> usize {
        self.closed_signed_in.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriverFactory for FakeFactory {
    type Driver = FakeShell;

    async fn open(&self) -> Result<FakeShell> {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeShell::new(self.app.clone()))
    }

    async fn close(&self, driver: FakeShell) -> Result<()> {
        if driver.signed_in_as().is_some() {
            self.closed_signed_in.fetch_add(1, Ordering::SeqCst);
        }
        self.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Test configuration pointing at the fake shell
pub fn config() -> role_harness::Config {
    let mut config = role_harness::Config::default();
    config.harness.base_url = BASE_URL.to_string();
    config
}
