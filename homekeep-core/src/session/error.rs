//! Session error types.

use std::time::Duration;

use crate::authority::AuthorityError;

/// Errors surfaced by the session coordinator.
///
/// Only explicit calls (`login`, `register`, `get_access_token`) return
/// these. Background reconciliation logs its failures and falls back to
/// the last known identity instead.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Wrong email/password, or sign-up details refused.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    /// The identity service could not be reached or answered with an error.
    #[error("Could not reach the identity service: {0}")]
    NetworkFailure(String),
    /// The identity service did not answer in time.
    #[error("The identity service did not answer within {0:?}")]
    TimeoutExceeded(Duration),
    /// The session was revoked or expired.
    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,
    /// Household memberships could not be loaded.
    #[error("Failed to load household memberships: {0}")]
    MembershipLoadFailure(String),
    /// A sign-out or another sign-in happened while the request was in flight.
    #[error("Signed out before the request completed")]
    Superseded,
    /// The account was created but its first household was not.
    #[error("Signed up, but the household could not be created: {0}")]
    HouseholdCreation(String),
}

impl From<AuthorityError> for SessionError {
    fn from(e: AuthorityError) -> Self {
        match e {
            AuthorityError::InvalidCredentials(message) => SessionError::InvalidCredentials(message),
            AuthorityError::SessionExpired => SessionError::SessionExpired,
            AuthorityError::Network(message) | AuthorityError::Decode(message) => {
                SessionError::NetworkFailure(message)
            }
            AuthorityError::Rejected { status, message } => {
                SessionError::NetworkFailure(format!("{} (status {})", message, status))
            }
        }
    }
}
