//! Identity value types.
//!
//! - **IdentitySnapshot**: the signed-in user plus household memberships
//! - **HouseholdMembership**: one role-scoped association with a household

mod membership;
mod snapshot;

pub use membership::{HouseholdMembership, HouseholdRole};
pub use snapshot::{IdentitySnapshot, UserProfile};
