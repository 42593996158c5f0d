//! Route admission probes.
//!
//! `ensure_authenticated()` walks these in order and stops at the first
//! probe that admits or denies. Each probe can be run on its own through
//! `SessionCoordinator::run_admission_probe`.

/// One step of the admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionProbe {
    /// The persisted cache holds an authenticated snapshot.
    PersistedCache,
    /// The publisher already holds an authenticated snapshot.
    Publisher,
    /// Time-bounded session probe against the authority. Skipped (denied)
    /// when there is no cache entry at all, so anonymous visits never
    /// touch the network.
    AuthoritySession,
}

/// Probes in evaluation order.
pub const ADMISSION_PROBES: [AdmissionProbe; 3] = [
    AdmissionProbe::PersistedCache,
    AdmissionProbe::Publisher,
    AdmissionProbe::AuthoritySession,
];

/// Result of running one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    Admit,
    Deny,
    /// No decision; try the next probe.
    Continue,
}
