//! Homekeep Core Library
//!
//! Identity snapshots, the identity cache, the authority gateway and the
//! session coordinator shared by Homekeep applications.

pub mod authority;
pub mod cache;
pub mod identity;
pub mod publisher;
pub mod session;
pub mod single_flight;

pub use authority::{
    AuthorityError, AuthorityUser, CreatedHousehold, HttpAuthority, IdentityAuthority,
    SessionInvalidated, SignedIn,
};
pub use cache::{CacheError, FileIdentityCache, IdentityCache, MemoryIdentityCache, IDENTITY_FILE};
pub use identity::{HouseholdMembership, HouseholdRole, IdentitySnapshot, UserProfile};
pub use publisher::{IdentityPublisher, IdentityStream, Publication, SharedIdentity};
pub use session::{
    AdmissionProbe, CoordinatorSettings, CoordinatorState, Navigator, NoopNavigator,
    ProbeVerdict, SessionCoordinator, SessionError, Settlement, SignOutReason,
};
pub use single_flight::{FlightHandle, InFlightError, SingleFlight};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
