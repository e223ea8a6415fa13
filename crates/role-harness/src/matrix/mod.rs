//! Role/Permission Matrix
//!
//! Static knowledge of which role holds which permissions, which feature
//! areas those permissions reveal, and which structural elements each
//! feature renders. Every scenario derives its expectations from here and
//! checks both directions: what must be visible and what must not be.
//!
//! The matrix is built once per process ([`Matrix::standard`]) and shared by
//! reference; nothing mutates it after construction.

mod features;
mod fixtures;
mod permissions;

pub use features::{
    catalog, ConditionalElement, ElementKind, FeatureArea, FeatureKey, StructuralElement,
};
pub use fixtures::{identities, Identity};
pub use permissions::{Permission, Role, RoleName};

use lazy_static::lazy_static;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::{HarnessError, Result};

lazy_static! {
    static ref STANDARD: Matrix = Matrix::build();
}

/// Roles, feature areas and identities of the application under test
#[derive(Debug, Clone)]
pub struct Matrix {
    roles: BTreeMap<RoleName, Role>,
    features: Vec<FeatureArea>,
    identities: Vec<Identity>,
}

impl Matrix {
    /// Process-wide matrix for the seeded application
    pub fn standard() -> &'static Matrix {
        &STANDARD
    }

    /// Assemble a matrix from parts
    pub fn new(roles: Vec<Role>, features: Vec<FeatureArea>, identities: Vec<Identity>) -> Self {
        Self {
            roles: roles.into_iter().map(|r| (r.name, r)).collect(),
            features,
            identities,
        }
    }

    fn build() -> Self {
        use Permission::*;

        let roles = vec![
            Role::new(RoleName::Administrator, Permission::ALL),
            Role::new(
                RoleName::SustainabilityTeamMember,
                [
                    ViewPackagingItems,
                    ViewProducts,
                    ViewSpecifications,
                    ViewSuppliers,
                    ExportReports,
                ],
            )
            .role_hidden_in_table(),
            Role::new(
                RoleName::PackagingTechnologist,
                [
                    EditPackagingItems,
                    ViewPackagingItems,
                    LoadProducts,
                    ViewProducts,
                    ViewSpecifications,
                    ViewSuppliers,
                ],
            )
            .org_unit_restricted(),
            Role::new(
                RoleName::QaTechnologist,
                [
                    ViewPackagingItems,
                    ViewProducts,
                    ViewSpecifications,
                    ViewSuppliers,
                ],
            )
            .org_unit_restricted(),
            Role::new(
                RoleName::PackagingSpecialist,
                [
                    ManageUsers,
                    EditPackagingItems,
                    ViewPackagingItems,
                    LoadProducts,
                    ViewProducts,
                    ManageSpecifications,
                    ViewSpecifications,
                    ManageSuppliers,
                    ViewSuppliers,
                ],
            )
            .org_unit_restricted(),
            Role::new(RoleName::Retailer, [ViewProducts, ImportSalesData]),
        ];

        Self::new(roles, catalog(), identities())
    }

    pub fn role(&self, name: RoleName) -> Result<&Role> {
        self.roles
            .get(&name)
            .ok_or_else(|| HarnessError::Config(format!("role \"{}\" is not in the matrix", name)))
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn feature(&self, key: FeatureKey) -> Result<&FeatureArea> {
        self.features
            .iter()
            .find(|f| f.key == key)
            .ok_or_else(|| HarnessError::Config(format!("feature \"{}\" is not in the catalog", key)))
    }

    /// Feature areas in menu order
    pub fn features(&self) -> &[FeatureArea] {
        &self.features
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// The seeded account holding this role
    pub fn identity_for(&self, role: RoleName) -> Result<&Identity> {
        self.identities
            .iter()
            .find(|i| i.role == role)
            .ok_or_else(|| HarnessError::Config(format!("no identity seeded for role \"{}\"", role)))
    }

    /// Whether the role may open the feature at all
    pub fn permits(&self, role: RoleName, key: FeatureKey) -> Result<bool> {
        let role = self.role(role)?;
        let feature = self.feature(key)?;
        Ok(role.has_any(&feature.gated_by))
    }

    /// Elements the role must see once the feature's frame is ready
    ///
    /// Empty when the role may not open the feature.
    pub fn expected_surfaces(&self, role: RoleName, key: FeatureKey) -> Result<Vec<StructuralElement>> {
        let role = self.role(role)?;
        let feature = self.feature(key)?;
        if !role.has_any(&feature.gated_by) {
            return Ok(Vec::new());
        }

        let mut elements = feature.elements.clone();
        for extra in &feature.conditional {
            if role.has_any(&extra.any_of) && !elements.contains(&extra.element) {
                elements.push(extra.element.clone());
            }
        }
        Ok(elements)
    }

    /// Permission-dependent elements the role must not see in a feature it
    /// may open
    pub fn hidden_surfaces(&self, role: RoleName, key: FeatureKey) -> Result<Vec<StructuralElement>> {
        let role = self.role(role)?;
        let feature = self.feature(key)?;
        if !role.has_any(&feature.gated_by) {
            return Ok(Vec::new());
        }

        Ok(feature
            .conditional
            .iter()
            .filter(|extra| !role.has_any(&extra.any_of))
            .map(|extra| extra.element.clone())
            .filter(|element| !feature.elements.contains(element))
            .collect())
    }

    /// Navigation entries the role must see; every other catalog entry must be absent
    pub fn expected_navigation(&self, role: RoleName) -> Result<BTreeSet<FeatureKey>> {
        let role = self.role(role)?;
        Ok(self
            .features
            .iter()
            .filter(|f| role.has_any(&f.gated_by))
            .map(|f| f.key)
            .collect())
    }

    /// Check internal consistency
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] naming the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        let mut keys = HashSet::new();
        for feature in &self.features {
            if !keys.insert(feature.key) {
                return Err(HarnessError::Config(format!(
                    "feature \"{}\" appears twice in the catalog",
                    feature.key
                )));
            }
            if feature.gated_by.is_empty() {
                return Err(HarnessError::Config(format!(
                    "feature \"{}\" is not gated by any permission",
                    feature.key
                )));
            }
        }

        let mut labels = HashSet::new();
        for feature in &self.features {
            if !labels.insert(feature.nav_label) {
                return Err(HarnessError::Config(format!(
                    "navigation label \"{}\" is used by more than one feature",
                    feature.nav_label
                )));
            }
        }

        for identity in &self.identities {
            self.role(identity.role)?;
        }
        Ok(())
    }
}
