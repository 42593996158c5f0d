//! Session bootstrap and identity reconciliation.
//!
//! - **SessionCoordinator**: publishes the cached identity at startup,
//!   confirms it against the authority, and handles sign-in, sign-up and
//!   sign-out
//! - **Admission probes**: the ordered checks behind `ensure_authenticated`

mod admission;
mod coordinator;
mod error;
mod settings;
mod state;


pub use admission::{AdmissionProbe, ProbeVerdict, ADMISSION_PROBES};
pub use coordinator::{CoordinatorBuilder, SessionCoordinator};
pub use error::SessionError;
pub use settings::{CoordinatorSettings, DEFAULT_RECONCILE_TIMEOUT, DEFAULT_SESSION_PROBE_TIMEOUT};
pub use state::{CoordinatorState, Navigator, NoopNavigator, Settlement, SignOutReason};
