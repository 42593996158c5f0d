//! Household membership held inside an identity snapshot.
//!
//! A household is the shared context (family, flat, ...) that all
//! record-keeping data is scoped to. A user may belong to several.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role a user holds within a household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HouseholdRole {
    /// Created the household or was promoted; can manage members.
    Admin,
    /// Regular member.
    Member,
}

impl std::fmt::Display for HouseholdRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HouseholdRole::Admin => write!(f, "Admin"),
            HouseholdRole::Member => write!(f, "Member"),
        }
    }
}

/// A user's role-scoped association with one household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdMembership {
    /// Identifier assigned by the identity authority
    pub household_id: String,

    /// Display name of the household
    pub household_name: String,

    /// Role the user holds in the household
    pub role: HouseholdRole,

    /// When the user joined
    pub joined_at: DateTime<Utc>,
}

impl HouseholdMembership {
    /// Create a membership joined now.
    pub fn new(
        household_id: impl Into<String>,
        household_name: impl Into<String>,
        role: HouseholdRole,
    ) -> Self {
        Self::joined_at(household_id, household_name, role, Utc::now())
    }

    /// Create a membership with an explicit join time.
    pub fn joined_at(
        household_id: impl Into<String>,
        household_name: impl Into<String>,
        role: HouseholdRole,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            household_id: household_id.into(),
            household_name: household_name.into(),
            role,
            joined_at,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == HouseholdRole::Admin
    }
}
