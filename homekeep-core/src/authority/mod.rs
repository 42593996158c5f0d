//! Gateway to the remote identity authority.
//!
//! The authority owns accounts, sessions and household memberships. Every
//! call may fail, and from the caller's point of view may also never return;
//! the session coordinator bounds them with soft timeouts.
//!
//! ## Implementations
//!
//! - [`HttpAuthority`]: REST adapter over `reqwest`
//! - a scripted fake used by the coordinator tests

mod http;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::identity::{HouseholdMembership, UserProfile};

pub use http::HttpAuthority;

/// Result of a successful sign-in or sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub user_id: String,
    pub session_token: String,
}

/// The authority's view of the current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityUser {
    pub user_id: String,
    pub email: String,
    pub profile: UserProfile,
}

/// A household freshly created by the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedHousehold {
    pub household_id: String,
    pub household_name: String,
}

/// Push notification: the authority revoked the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInvalidated {
    pub reason: String,
}

impl SessionInvalidated {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors returned by the identity authority.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthorityError {
    /// Wrong email/password, or the account details were refused.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    /// The session is no longer valid.
    #[error("Session expired")]
    SessionExpired,
    /// Could not reach the authority.
    #[error("Network error: {0}")]
    Network(String),
    /// The authority answered with an unexpected status.
    #[error("Authority rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The response body could not be decoded.
    #[error("Invalid response from authority: {0}")]
    Decode(String),
}

/// Async contract of the remote identity service.
#[async_trait]
pub trait IdentityAuthority: Send + Sync {
    /// Create an account and open a session for it.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &UserProfile,
    ) -> Result<SignedIn, AuthorityError>;

    /// Open a session for an existing account.
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthorityError>;

    /// Probe the current session. `Ok(None)` means the authority reports no
    /// session; a held token that the authority rejects is `SessionExpired`.
    async fn get_session(&self) -> Result<Option<String>, AuthorityError>;

    /// The user owning the current session, if any.
    async fn get_current_user(&self) -> Result<Option<AuthorityUser>, AuthorityError>;

    async fn list_household_memberships(
        &self,
        user_id: &str,
    ) -> Result<Vec<HouseholdMembership>, AuthorityError>;

    async fn create_household(
        &self,
        name: &str,
        owner_id: &str,
    ) -> Result<CreatedHousehold, AuthorityError>;

    /// Close the current session. Callers treat failures as best-effort.
    async fn sign_out(&self) -> Result<(), AuthorityError>;

    /// Subscribe to forced sign-out notifications.
    ///
    /// Authorities without a push channel return `None`.
    fn subscribe_invalidations(&self) -> Option<broadcast::Receiver<SessionInvalidated>> {
        None
    }
}
