use std::time::Duration;

/// Default ceiling for a single session probe.
pub const DEFAULT_SESSION_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default ceiling for a whole reconciliation (probe, user, memberships).
pub const DEFAULT_RECONCILE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeouts used by the session coordinator.
///
/// Both are soft: when one elapses the coordinator stops waiting and falls
/// back, but the underlying call keeps running and its result may still be
/// applied later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub session_probe_timeout: Duration,
    pub reconcile_timeout: Duration,
}

impl CoordinatorSettings {
    pub fn new(session_probe_timeout: Duration, reconcile_timeout: Duration) -> Self {
        Self {
            session_probe_timeout,
            reconcile_timeout,
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_PROBE_TIMEOUT, DEFAULT_RECONCILE_TIMEOUT)
    }
}
