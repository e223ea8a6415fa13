//! Seeded accounts the application under test ships with

use serde::{Deserialize, Serialize};

use super::permissions::RoleName;

/// A set of credentials bound to one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Name the shell shows on the account control
    pub display_name: String,
    pub role: RoleName,
    /// Organisational units the account is scoped to
    #[serde(default)]
    pub org_units: Vec<String>,
}

impl Identity {
    pub fn new(email: &str, password: &str, display_name: &str, role: RoleName) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            display_name: display_name.to_string(),
            role,
            org_units: Vec::new(),
        }
    }

    pub fn in_org_unit(mut self, unit: &str) -> Self {
        self.org_units.push(unit.to_string());
        self
    }
}

pub fn identities() -> Vec<Identity> {
    vec![
        Identity::new(
            "admin@example.com",
            "admin",
            "Admin User",
            RoleName::Administrator,
        ),
        Identity::new(
            "sustainability.member@packtrac.com",
            "password",
            "Sustainability Team Member Test",
            RoleName::SustainabilityTeamMember,
        ),
        Identity::new(
            "packaging.tech@packtrac.com",
            "password",
            "Packaging Technologist Test",
            RoleName::PackagingTechnologist,
        ),
        Identity::new(
            "qa.tech@packtrac.com",
            "password",
            "QA Technologist Test",
            RoleName::QaTechnologist,
        ),
        Identity::new(
            "packaging.specialist@packtrac.com",
            "password",
            "Packaging Specialist Test",
            RoleName::PackagingSpecialist,
        )
        .in_org_unit("Food & Beverages"),
        Identity::new(
            "retailer@packtrac.com",
            "password",
            "Retailer User Test",
            RoleName::Retailer,
        ),
    ]
}
