//! Wires the session coordinator to the configured identity service.

use std::sync::Arc;

use homekeep_core::{
    FileIdentityCache, HttpAuthority, Navigator, SessionCoordinator, SignOutReason,
};

use crate::config::Config;

/// Session token file inside the data directory.
pub const TOKEN_FILE: &str = "session.token";

/// Tells the terminal user about sign-outs.
pub struct CliNavigator;

impl Navigator for CliNavigator {
    fn signed_out(&self, reason: SignOutReason) {
        match reason {
            SignOutReason::UserRequested => println!("Signed out."),
            SignOutReason::SessionExpired => eprintln!(
                "Your session has expired. Please sign in again with 'homekeep login'."
            ),
        }
    }
}

/// Build a coordinator for `config` and start listening for invalidations.
///
/// Must be called from within a Tokio runtime.
pub fn open(config: &Config) -> SessionCoordinator {
    let data_dir = config.data_dir.value.clone();
    tracing::debug!(
        "Using identity service {} with data in {}",
        config.authority_url.value,
        data_dir.display()
    );
    let authority = HttpAuthority::with_token_file(
        config.authority_url.value.clone(),
        data_dir.join(TOKEN_FILE),
    );
    let cache = FileIdentityCache::new(data_dir);

    let coordinator = SessionCoordinator::builder(Arc::new(authority), Arc::new(cache))
        .settings(config.coordinator_settings())
        .navigator(Arc::new(CliNavigator))
        .build();

    // Runs until the coordinator is dropped
    let _ = coordinator.watch_invalidations();
    coordinator
}
