//! Identity snapshot: who is signed in and in which households.
//!
//! Snapshots are values. The coordinator never edits a published snapshot;
//! every change builds a new one and replaces the old one wholesale, so
//! readers holding an `Arc<IdentitySnapshot>` can never observe a torn update.

use serde::{Deserialize, Serialize};

use super::HouseholdMembership;

/// Optional profile details supplied at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl UserProfile {
    pub fn new(first_name: Option<String>, last_name: Option<String>) -> Self {
        Self {
            first_name,
            last_name,
        }
    }
}

/// The current signed-in user and their household memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySnapshot {
    /// Authority-assigned user ID. Empty means "not authenticated".
    pub user_id: String,

    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    /// Households the user belongs to. Empty is valid (no household yet).
    #[serde(default)]
    pub households: Vec<HouseholdMembership>,
}

impl IdentitySnapshot {
    /// Minimal snapshot published right after sign-in, before memberships are known.
    pub fn minimal(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
            households: Vec::new(),
        }
    }

    /// Build a snapshot from authority data.
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        profile: UserProfile,
        households: Vec<HouseholdMembership>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            first_name: profile.first_name,
            last_name: profile.last_name,
            households,
        }
    }

    /// Returns a copy of this snapshot with the given memberships.
    pub fn with_households(&self, households: Vec<HouseholdMembership>) -> Self {
        Self {
            households,
            ..self.clone()
        }
    }

    /// A snapshot is authenticated iff it carries a non-empty user ID.
    pub fn is_authenticated(&self) -> bool {
        !self.user_id.trim().is_empty()
    }

    /// First membership's household ID, if any.
    pub fn default_household_id(&self) -> Option<&str> {
        self.households.first().map(|h| h.household_id.as_str())
    }

    pub fn household(&self, household_id: &str) -> Option<&HouseholdMembership> {
        self.households
            .iter()
            .find(|h| h.household_id == household_id)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile::new(self.first_name.clone(), self.last_name.clone())
    }

    /// Human-facing name: "First Last" when known, otherwise the email.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone(),
        }
    }
}
