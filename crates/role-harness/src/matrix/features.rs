//! Feature area catalog
//!
//! Each feature area is a micro-frontend reached through one navigation entry
//! in the shell and rendered inside an `<iframe>` titled after the feature.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::permissions::Permission;
use crate::error::HarnessError;
use crate::locator::{AriaRole, Locator, NameMatch};

lazy_static! {
    static ref PACKAGING_ROUTE: Regex = Regex::new(r"/packaging(?:[/?#]|$)").unwrap();
    static ref PRODUCTS_ROUTE: Regex = Regex::new(r"/products(?:[/?#]|$)").unwrap();
    static ref SPECIFICATIONS_ROUTE: Regex = Regex::new(r"/specifications(?:[/?#]|$)").unwrap();
    static ref SUPPLIERS_ROUTE: Regex = Regex::new(r"/suppliers(?:[/?#]|$)").unwrap();
    static ref USERS_ROUTE: Regex = Regex::new(r"/users(?:[/?#]|$)").unwrap();
    static ref REPORTS_ROUTE: Regex = Regex::new(r"/reports(?:[/?#]|$)").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKey {
    Packaging,
    Products,
    Specifications,
    Suppliers,
    Users,
    Reports,
}

impl FeatureKey {
    pub const ALL: [FeatureKey; 6] = [
        FeatureKey::Packaging,
        FeatureKey::Products,
        FeatureKey::Specifications,
        FeatureKey::Suppliers,
        FeatureKey::Users,
        FeatureKey::Reports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKey::Packaging => "packaging",
            FeatureKey::Products => "products",
            FeatureKey::Specifications => "specifications",
            FeatureKey::Suppliers => "suppliers",
            FeatureKey::Users => "users",
            FeatureKey::Reports => "reports",
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureKey {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HarnessError::Config(format!("unknown feature \"{}\"", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Table,
    Heading,
    ColumnHeader,
    Input,
    Text,
    /// A button inside the rows of the frame's table
    RowAction,
}

/// An element a loaded micro-frontend is expected to render
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructuralElement {
    pub kind: ElementKind,
    /// Accessible name, placeholder, or text, depending on the kind
    pub hint: Option<String>,
}

impl StructuralElement {
    pub fn table() -> Self {
        Self {
            kind: ElementKind::Table,
            hint: None,
        }
    }

    pub fn heading(name: &str) -> Self {
        Self::hinted(ElementKind::Heading, name)
    }

    pub fn column_header(name: &str) -> Self {
        Self::hinted(ElementKind::ColumnHeader, name)
    }

    pub fn input(placeholder: &str) -> Self {
        Self::hinted(ElementKind::Input, placeholder)
    }

    pub fn text(text: &str) -> Self {
        Self::hinted(ElementKind::Text, text)
    }

    pub fn row_action(name: &str) -> Self {
        Self::hinted(ElementKind::RowAction, name)
    }

    fn hinted(kind: ElementKind, hint: &str) -> Self {
        Self {
            kind,
            hint: Some(hint.to_string()),
        }
    }

    /// Locator resolving this element by role and exact name where possible
    pub fn locator(&self) -> Locator {
        let hint = self.hint.as_deref();
        match (self.kind, hint) {
            (ElementKind::Table, _) => Locator::role(AriaRole::Table),
            (ElementKind::Heading, Some(name)) => Locator::exact(AriaRole::Heading, name),
            (ElementKind::Heading, None) => Locator::role(AriaRole::Heading),
            (ElementKind::ColumnHeader, Some(name)) => Locator::exact(AriaRole::ColumnHeader, name),
            (ElementKind::ColumnHeader, None) => Locator::role(AriaRole::ColumnHeader),
            (ElementKind::Input, Some(placeholder)) => Locator::placeholder(placeholder),
            (ElementKind::Input, None) => Locator::role(AriaRole::Textbox),
            (ElementKind::Text, Some(text)) => Locator::text(NameMatch::exact(text)),
            (ElementKind::Text, None) => Locator::text(NameMatch::NonEmpty),
            (ElementKind::RowAction, Some(name)) => Locator::role(AriaRole::Table).child(
                Locator::role_named(
                    AriaRole::Button,
                    NameMatch::ContainsAny(vec![name.to_string(), name.to_lowercase()]),
                ),
            ),
            (ElementKind::RowAction, None) => {
                Locator::role(AriaRole::Table).child(Locator::role(AriaRole::Button))
            }
        }
    }
}

impl fmt::Display for StructuralElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ElementKind::Table => "table",
            ElementKind::Heading => "heading",
            ElementKind::ColumnHeader => "column header",
            ElementKind::Input => "input",
            ElementKind::Text => "text",
            ElementKind::RowAction => "row action",
        };
        match &self.hint {
            Some(hint) => write!(f, "{} \"{}\"", kind, hint),
            None => f.write_str(kind),
        }
    }
}

/// An element shown only to roles holding one of the listed permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalElement {
    pub any_of: Vec<Permission>,
    pub element: StructuralElement,
}

/// One micro-frontend reachable from the shell navigation
#[derive(Debug, Clone)]
pub struct FeatureArea {
    pub key: FeatureKey,
    /// Accessible name of the navigation link
    pub nav_label: &'static str,
    /// Pattern the page URL matches once the feature is open
    pub url_pattern: Regex,
    /// Title attribute of the content `<iframe>`
    pub frame_title: &'static str,
    /// Element whose presence means the frame finished loading
    pub landmark: StructuralElement,
    /// Elements every permitted role sees
    pub elements: Vec<StructuralElement>,
    /// Elements that depend on additional permissions
    pub conditional: Vec<ConditionalElement>,
    /// The navigation entry is shown to roles holding any of these
    pub gated_by: Vec<Permission>,
    /// Readiness deadline when it differs from the global default
    pub ready_timeout: Option<Duration>,
}

impl FeatureArea {
    fn new(
        key: FeatureKey,
        nav_label: &'static str,
        url_pattern: &Regex,
        frame_title: &'static str,
        landmark: StructuralElement,
    ) -> Self {
        Self {
            key,
            nav_label,
            url_pattern: url_pattern.clone(),
            frame_title,
            landmark,
            elements: Vec::new(),
            conditional: Vec::new(),
            gated_by: Vec::new(),
            ready_timeout: None,
        }
    }

    fn with_element(mut self, element: StructuralElement) -> Self {
        self.elements.push(element);
        self
    }

    fn with_element_when(mut self, any_of: &[Permission], element: StructuralElement) -> Self {
        self.conditional.push(ConditionalElement {
            any_of: any_of.to_vec(),
            element,
        });
        self
    }

    fn gated_by(mut self, permissions: &[Permission]) -> Self {
        self.gated_by = permissions.to_vec();
        self
    }

    fn ready_within(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    /// Locator for this feature's navigation link
    pub fn nav_link(&self) -> Locator {
        Locator::exact(AriaRole::Link, self.nav_label)
    }
}

/// The features of the shell, in menu order
pub fn catalog() -> Vec<FeatureArea> {
    use Permission::*;

    vec![
        FeatureArea::new(
            FeatureKey::Packaging,
            "Packaging Items",
            &PACKAGING_ROUTE,
            "Packaging Items",
            StructuralElement::table(),
        )
        .with_element(StructuralElement::table())
        .with_element(StructuralElement::column_header("Description"))
        .with_element(StructuralElement::column_header("Material"))
        .with_element(StructuralElement::column_header("Status"))
        .gated_by(&[ViewPackagingItems]),
        FeatureArea::new(
            FeatureKey::Products,
            "Products",
            &PRODUCTS_ROUTE,
            "Products",
            StructuralElement::table(),
        )
        .with_element(StructuralElement::table())
        .gated_by(&[ViewProducts]),
        FeatureArea::new(
            FeatureKey::Specifications,
            "Specifications",
            &SPECIFICATIONS_ROUTE,
            "Specifications",
            StructuralElement::heading("Specifications"),
        )
        .with_element(StructuralElement::heading("Specifications"))
        .with_element(StructuralElement::text("Total SKUs"))
        .with_element(StructuralElement::table())
        .gated_by(&[ViewSpecifications]),
        FeatureArea::new(
            FeatureKey::Suppliers,
            "Packaging Suppliers",
            &SUPPLIERS_ROUTE,
            "Suppliers",
            StructuralElement::heading("Suppliers"),
        )
        .with_element(StructuralElement::heading("Suppliers"))
        .with_element(StructuralElement::table())
        .with_element(StructuralElement::column_header("Name"))
        .with_element(StructuralElement::column_header("DFFE Registration"))
        .gated_by(&[ViewSuppliers]),
        FeatureArea::new(
            FeatureKey::Users,
            "User Management",
            &USERS_ROUTE,
            "User Management",
            StructuralElement::input("Search users..."),
        )
        .with_element(StructuralElement::input("Search users..."))
        .with_element(StructuralElement::table())
        .with_element_when(&[ManageUsers], StructuralElement::row_action("Edit"))
        .gated_by(&[ManageUsers]),
        FeatureArea::new(
            FeatureKey::Reports,
            "EPR Reports",
            &REPORTS_ROUTE,
            "EPR Reports",
            StructuralElement::heading("EPR Reports"),
        )
        .with_element(StructuralElement::heading("EPR Reports"))
        .with_element_when(
            &[ImportSalesData, ViewSalesData],
            StructuralElement::heading("Sales Data"),
        )
        .gated_by(&[ViewSalesData, ImportSalesData, ExportReports])
        .ready_within(Duration::from_secs(8)),
    ]
}
