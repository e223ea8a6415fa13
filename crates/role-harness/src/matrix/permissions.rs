//! Permission and role vocabulary

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::HarnessError;

/// A capability granted to a role, named exactly as the application labels it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "Manage Users")]
    ManageUsers,
    #[serde(rename = "Manage Organizational Hierarchy")]
    ManageOrganizationalHierarchy,
    #[serde(rename = "Edit Packaging Items")]
    EditPackagingItems,
    #[serde(rename = "View Packaging Items")]
    ViewPackagingItems,
    #[serde(rename = "Load Products")]
    LoadProducts,
    #[serde(rename = "View Products")]
    ViewProducts,
    #[serde(rename = "Manage Specifications")]
    ManageSpecifications,
    #[serde(rename = "View Specifications")]
    ViewSpecifications,
    #[serde(rename = "Manage Suppliers")]
    ManageSuppliers,
    #[serde(rename = "View Suppliers")]
    ViewSuppliers,
    #[serde(rename = "Import Sales Data")]
    ImportSalesData,
    #[serde(rename = "Export Reports")]
    ExportReports,
    #[serde(rename = "View Sales Data")]
    ViewSalesData,
}

impl Permission {
    pub const ALL: [Permission; 13] = [
        Permission::ManageUsers,
        Permission::ManageOrganizationalHierarchy,
        Permission::EditPackagingItems,
        Permission::ViewPackagingItems,
        Permission::LoadProducts,
        Permission::ViewProducts,
        Permission::ManageSpecifications,
        Permission::ViewSpecifications,
        Permission::ManageSuppliers,
        Permission::ViewSuppliers,
        Permission::ImportSalesData,
        Permission::ExportReports,
        Permission::ViewSalesData,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "Manage Users",
            Permission::ManageOrganizationalHierarchy => "Manage Organizational Hierarchy",
            Permission::EditPackagingItems => "Edit Packaging Items",
            Permission::ViewPackagingItems => "View Packaging Items",
            Permission::LoadProducts => "Load Products",
            Permission::ViewProducts => "View Products",
            Permission::ManageSpecifications => "Manage Specifications",
            Permission::ViewSpecifications => "View Specifications",
            Permission::ManageSuppliers => "Manage Suppliers",
            Permission::ViewSuppliers => "View Suppliers",
            Permission::ImportSalesData => "Import Sales Data",
            Permission::ExportReports => "Export Reports",
            Permission::ViewSalesData => "View Sales Data",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Permission {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HarnessError::Config(format!("unknown permission \"{}\"", s)))
    }
}

/// The named roles the application ships with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoleName {
    #[serde(rename = "Administrator")]
    Administrator,
    #[serde(rename = "Packaging Technologist")]
    PackagingTechnologist,
    #[serde(rename = "QA Technologist")]
    QaTechnologist,
    #[serde(rename = "Packaging Specialist")]
    PackagingSpecialist,
    #[serde(rename = "Retailer")]
    Retailer,
    #[serde(rename = "Sustainability Team Member")]
    SustainabilityTeamMember,
}

impl RoleName {
    pub const ALL: [RoleName; 6] = [
        RoleName::Administrator,
        RoleName::PackagingTechnologist,
        RoleName::QaTechnologist,
        RoleName::PackagingSpecialist,
        RoleName::Retailer,
        RoleName::SustainabilityTeamMember,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RoleName::Administrator => "Administrator",
            RoleName::PackagingTechnologist => "Packaging Technologist",
            RoleName::QaTechnologist => "QA Technologist",
            RoleName::PackagingSpecialist => "Packaging Specialist",
            RoleName::Retailer => "Retailer",
            RoleName::SustainabilityTeamMember => "Sustainability Team Member",
        }
    }

    /// Short identifier for CLI filters and scenario names
    pub fn slug(&self) -> &'static str {
        match self {
            RoleName::Administrator => "admin",
            RoleName::PackagingTechnologist => "packaging-technologist",
            RoleName::QaTechnologist => "qa-technologist",
            RoleName::PackagingSpecialist => "packaging-specialist",
            RoleName::Retailer => "retailer",
            RoleName::SustainabilityTeamMember => "sustainability",
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RoleName {
    type Err = HarnessError;

    /// Accepts either the label ("QA Technologist") or the slug ("qa-technologist")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        RoleName::ALL
            .iter()
            .copied()
            .find(|r| r.label().eq_ignore_ascii_case(s) || r.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| HarnessError::Config(format!("unknown role \"{}\"", s)))
    }
}

/// A role and the capabilities it grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: RoleName,
    pub permissions: BTreeSet<Permission>,
    /// Members must be scoped to the first organisational unit and all of its children
    pub org_unit_restricted: bool,
    /// Whether the user management table prints this role's name in the role column
    pub table_shows_role: bool,
}

impl Role {
    pub fn new(name: RoleName, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            name,
            permissions: permissions.into_iter().collect(),
            org_unit_restricted: false,
            table_shows_role: true,
        }
    }

    pub fn org_unit_restricted(mut self) -> Self {
        self.org_unit_restricted = true;
        self
    }

    pub fn role_hidden_in_table(mut self) -> Self {
        self.table_shows_role = false;
        self
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn has_any(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.has(*p))
    }
}
