//! Coordinator lifecycle and sign-out hand-off.

/// Outcome of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Authenticated,
    Unauthenticated,
}

impl Settlement {
    pub fn from_authenticated(authenticated: bool) -> Self {
        if authenticated {
            Settlement::Authenticated
        } else {
            Settlement::Unauthenticated
        }
    }
}

/// Coordinator lifecycle: `Idle → Reconciling → Settled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Nothing has been reconciled yet.
    Idle,
    /// A reconciliation against the authority is in progress.
    Reconciling,
    /// The current identity is settled.
    Settled(Settlement),
}

impl CoordinatorState {
    pub fn is_settled(&self) -> bool {
        matches!(self, CoordinatorState::Settled(_))
    }
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorState::Idle => write!(f, "idle"),
            CoordinatorState::Reconciling => write!(f, "reconciling"),
            CoordinatorState::Settled(Settlement::Authenticated) => write!(f, "authenticated"),
            CoordinatorState::Settled(Settlement::Unauthenticated) => {
                write!(f, "unauthenticated")
            }
        }
    }
}

/// Why the user was signed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// The user asked to sign out.
    UserRequested,
    /// The authority revoked or expired the session.
    SessionExpired,
}

/// Route admission collaborator notified after every sign-out.
///
/// Implementations redirect to the sign-in entry point; for
/// `SessionExpired` they also tell the user their session expired.
pub trait Navigator: Send + Sync {
    fn signed_out(&self, reason: SignOutReason);
}

/// Navigator that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn signed_out(&self, _reason: SignOutReason) {}
}
