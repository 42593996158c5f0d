//! The session coordinator.
//!
//! Owns the publisher and the identity cache and is the only writer to
//! either. Every sign-in, sign-out and forced expiry bumps a generation
//! counter; results of work started under an older generation are
//! discarded when they land.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::admission::{AdmissionProbe, ProbeVerdict, ADMISSION_PROBES};
use super::error::SessionError;
use super::settings::CoordinatorSettings;
use super::state::{CoordinatorState, Navigator, NoopNavigator, Settlement, SignOutReason};
use crate::authority::{AuthorityError, AuthorityUser, IdentityAuthority};
use crate::cache::IdentityCache;
use crate::identity::{HouseholdMembership, HouseholdRole, IdentitySnapshot, UserProfile};
use crate::publisher::{IdentityPublisher, IdentityStream, SharedIdentity};
use crate::single_flight::{FlightHandle, SingleFlight};

type ProbeResult = Result<Option<String>, AuthorityError>;
type Settled = Option<oneshot::Sender<Option<SharedIdentity>>>;

struct Inner {
    authority: Arc<dyn IdentityAuthority>,
    cache: Arc<dyn IdentityCache>,
    navigator: Arc<dyn Navigator>,
    settings: CoordinatorSettings,
    publisher: IdentityPublisher,
    /// Held while applying, so a check-then-write never interleaves with a
    /// transition.
    generation: Mutex<u64>,
    /// Explicit sign-ins in progress.
    sign_ins: AtomicUsize,
    state: watch::Sender<CoordinatorState>,
    reconciles: SingleFlight<u64, Option<SharedIdentity>>,
    session_probes: SingleFlight<u64, ProbeResult>,
}

/// Builder for [`SessionCoordinator`].
pub struct CoordinatorBuilder {
    authority: Arc<dyn IdentityAuthority>,
    cache: Arc<dyn IdentityCache>,
    navigator: Arc<dyn Navigator>,
    settings: CoordinatorSettings,
}

impl CoordinatorBuilder {
    pub fn settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn build(self) -> SessionCoordinator {
        let (state, _) = watch::channel(CoordinatorState::Idle);
        SessionCoordinator {
            inner: Arc::new(Inner {
                authority: self.authority,
                cache: self.cache,
                navigator: self.navigator,
                settings: self.settings,
                publisher: IdentityPublisher::new(),
                generation: Mutex::new(0),
                sign_ins: AtomicUsize::new(0),
                state,
                reconciles: SingleFlight::new(),
                session_probes: SingleFlight::new(),
            }),
        }
    }
}

/// Bootstraps and reconciles the signed-in identity.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

impl SessionCoordinator {
    pub fn builder(
        authority: Arc<dyn IdentityAuthority>,
        cache: Arc<dyn IdentityCache>,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder {
            authority,
            cache,
            navigator: Arc::new(NoopNavigator),
            settings: CoordinatorSettings::default(),
        }
    }

    pub fn new(authority: Arc<dyn IdentityAuthority>, cache: Arc<dyn IdentityCache>) -> Self {
        Self::builder(authority, cache).build()
    }

    // ==================== Reading ====================

    pub fn current_identity(&self) -> Option<SharedIdentity> {
        self.inner.publisher.current()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.publisher.is_authenticated()
    }

    pub fn subscribe(&self) -> IdentityStream {
        self.inner.publisher.subscribe()
    }

    /// First household of the current identity, if any.
    pub fn get_default_household_id(&self) -> Option<String> {
        self.current_identity()
            .and_then(|s| s.default_household_id().map(str::to_string))
    }

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state.borrow()
    }

    /// Wait until the coordinator is settled and return that state.
    pub async fn settled(&self) -> CoordinatorState {
        let mut states = self.inner.state.subscribe();
        let state = match states.wait_for(CoordinatorState::is_settled).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }

    pub fn settings(&self) -> CoordinatorSettings {
        self.inner.settings
    }

    // ==================== Bootstrap ====================

    /// Publish the cached identity and reconcile in the background.
    ///
    /// Returns the optimistic value without waiting for the authority.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Option<SharedIdentity> {
        let optimistic = self.publish_cached(self.generation());
        self.spawn_reconcile();
        optimistic
    }

    /// Confirm the current identity against the authority.
    ///
    /// Concurrent calls share one run. Never fails: on timeouts and
    /// transient errors the last known identity is kept and returned.
    pub async fn reconcile(&self) -> Option<SharedIdentity> {
        let generation = self.generation();
        let this = self.clone();
        let flight = self
            .inner
            .reconciles
            .join_or_start(generation, move || this.reconcile_flight(generation));

        if !flight.is_leader() {
            debug!("Joining reconciliation already in flight");
        }

        match flight.wait().await {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Reconciliation ended without a result: {}", e);
                self.current_identity()
            }
        }
    }

    /// Route admission: true if the user may enter a protected area.
    pub async fn ensure_authenticated(&self) -> bool {
        for probe in ADMISSION_PROBES {
            match self.run_admission_probe(probe).await {
                ProbeVerdict::Admit => {
                    debug!("Admitted by {:?}", probe);
                    return true;
                }
                ProbeVerdict::Deny => {
                    debug!("Denied by {:?}", probe);
                    return false;
                }
                ProbeVerdict::Continue => {}
            }
        }
        false
    }

    /// Run a single admission probe.
    pub async fn run_admission_probe(&self, probe: AdmissionProbe) -> ProbeVerdict {
        match probe {
            AdmissionProbe::PersistedCache => {
                if self.inner.cache.get().is_some_and(|s| s.is_authenticated()) {
                    ProbeVerdict::Admit
                } else {
                    ProbeVerdict::Continue
                }
            }
            AdmissionProbe::Publisher => {
                if self.is_authenticated() {
                    ProbeVerdict::Admit
                } else {
                    ProbeVerdict::Continue
                }
            }
            AdmissionProbe::AuthoritySession => {
                if !self.inner.cache.has_entry() {
                    return ProbeVerdict::Deny;
                }

                let limit = self.inner.settings.session_probe_timeout;
                match timeout(limit, self.session_probe(self.generation()).wait()).await {
                    Ok(Ok(Ok(Some(_)))) => {
                        // Fill the publisher for whoever is let in
                        self.spawn_reconcile();
                        ProbeVerdict::Admit
                    }
                    Ok(Ok(Ok(None))) => ProbeVerdict::Deny,
                    Ok(Ok(Err(e))) => {
                        warn!("Session probe failed: {}", e);
                        ProbeVerdict::Deny
                    }
                    Ok(Err(e)) => {
                        warn!("Session probe aborted: {}", e);
                        ProbeVerdict::Deny
                    }
                    Err(_) => {
                        warn!("Session probe did not answer within {:?}", limit);
                        ProbeVerdict::Deny
                    }
                }
            }
        }
    }

    /// Token of the authority session, if one is open.
    pub async fn get_access_token(&self) -> Result<Option<String>, SessionError> {
        let generation = self.generation();
        let limit = self.inner.settings.session_probe_timeout;

        match timeout(limit, self.session_probe(generation).wait()).await {
            Ok(Ok(Ok(token))) => Ok(token),
            Ok(Ok(Err(AuthorityError::SessionExpired))) => {
                self.expire(Some(generation));
                Err(SessionError::SessionExpired)
            }
            Ok(Ok(Err(e))) => Err(e.into()),
            Ok(Err(e)) => Err(SessionError::NetworkFailure(e.to_string())),
            Err(_) => Err(SessionError::TimeoutExceeded(limit)),
        }
    }

    // ==================== Explicit transitions ====================

    /// Sign in. Publishes a minimal identity right away and loads the
    /// household memberships in the background.
    ///
    /// On failure nothing changes. Work started before the call is
    /// superseded by it; a sign-out while it is in flight wins and the
    /// result is discarded.
    pub async fn login(&self, email: &str, password: &str) -> Result<SharedIdentity, SessionError> {
        let email = email.trim();
        require_credentials(email, password)?;
        let sign_in = self.begin_sign_in();

        let signed_in = self
            .bounded(self.inner.authority.sign_in(email, password))
            .await
            .inspect_err(|e| info!("Sign-in failed: {}", e))?;

        let snapshot = Arc::new(IdentitySnapshot::minimal(signed_in.user_id, email));
        if self.transition(Some(sign_in.started), Some(snapshot.clone())).is_none() {
            return Err(self.discard_sign_in(&snapshot.user_id).await);
        }
        info!("Signed in as user {}", snapshot.user_id);

        self.spawn_reconcile();
        Ok(snapshot)
    }

    /// Create an account and its first household, owned by the new user.
    ///
    /// If the account is created but the household is not, the user stays
    /// signed in without a household and `HouseholdCreation` is returned.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        profile: UserProfile,
        household_name: &str,
    ) -> Result<SharedIdentity, SessionError> {
        let email = email.trim();
        let household_name = household_name.trim();
        require_credentials(email, password)?;
        if household_name.is_empty() {
            return Err(SessionError::HouseholdCreation(
                "A household name is required".to_string(),
            ));
        }
        let sign_in = self.begin_sign_in();

        let signed_in = self
            .bounded(self.inner.authority.sign_up(email, password, &profile))
            .await
            .inspect_err(|e| info!("Sign-up failed: {}", e))?;
        let identity = IdentitySnapshot::new(signed_in.user_id.clone(), email, profile, Vec::new());

        let created = self
            .bounded(
                self.inner
                    .authority
                    .create_household(household_name, &signed_in.user_id),
            )
            .await;

        match created {
            Ok(created) => {
                let membership = HouseholdMembership::new(
                    created.household_id,
                    created.household_name,
                    HouseholdRole::Admin,
                );
                let snapshot = Arc::new(identity.with_households(vec![membership]));
                if self.transition(Some(sign_in.started), Some(snapshot.clone())).is_none() {
                    return Err(self.discard_sign_in(&snapshot.user_id).await);
                }
                info!(
                    "Registered user {} with household {}",
                    snapshot.user_id, household_name
                );
                Ok(snapshot)
            }
            Err(e) => {
                let user_id = identity.user_id.clone();
                if self.transition(Some(sign_in.started), Some(Arc::new(identity))).is_none() {
                    return Err(self.discard_sign_in(&user_id).await);
                }
                warn!("Account created but household creation failed: {}", e);
                Err(SessionError::HouseholdCreation(e.to_string()))
            }
        }
    }

    /// Sign out. Local state is cleared first; the remote sign-out is best effort.
    pub async fn logout(&self) {
        self.transition(None, None);
        info!("Signed out");

        self.remote_sign_out().await;
        self.inner.navigator.signed_out(SignOutReason::UserRequested);
    }

    /// Listen for authority-pushed session invalidations.
    ///
    /// Each event forces a local sign-out without calling the authority.
    /// Returns `None` if the authority has no push channel. The listener
    /// ends when the coordinator is dropped.
    pub fn watch_invalidations(&self) -> Option<JoinHandle<()>> {
        let mut events = self.inner.authority.subscribe_invalidations()?;
        let inner = Arc::downgrade(&self.inner);

        Some(tokio::spawn(async move {
            loop {
                let event = events.recv().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let coordinator = SessionCoordinator { inner };

                match event {
                    Ok(event) => {
                        info!("Session invalidated by authority: {}", event.reason);
                        coordinator.expire(None);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Missed {} session invalidation(s)", missed);
                        coordinator.expire(None);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }

    // ==================== Reconciliation internals ====================

    /// Runs as the shared flight. The confirmation itself runs on its own
    /// task so giving up here never cancels it.
    async fn reconcile_flight(self, generation: u64) -> Option<SharedIdentity> {
        self.set_state(CoordinatorState::Reconciling);
        self.publish_cached(generation);

        let settings = self.inner.settings;
        let deadline = Instant::now() + settings.reconcile_timeout;
        let (probe_tx, probe_rx) = oneshot::channel();
        let (settled_tx, settled_rx) = oneshot::channel();
        tokio::spawn(
            self.clone()
                .confirm(generation, deadline, probe_tx, Some(settled_tx)),
        );

        let identity = match timeout(settings.session_probe_timeout, probe_rx).await {
            Ok(Ok(())) => match settled_rx.await {
                Ok(identity) => identity,
                Err(_) => {
                    warn!("Reconciliation stopped early; keeping last known identity");
                    self.current_identity()
                }
            },
            Ok(Err(_)) => {
                warn!("Session probe stopped early; keeping last known identity");
                self.current_identity()
            }
            Err(_) => {
                warn!(
                    "Session probe did not answer within {:?}; keeping last known identity",
                    settings.session_probe_timeout
                );
                self.current_identity()
            }
        };

        self.set_state(CoordinatorState::Settled(Settlement::from_authenticated(
            self.is_authenticated(),
        )));
        identity
    }

    /// Probe, then user, then memberships, then apply.
    ///
    /// Reports on `settled` as soon as there is something to settle on,
    /// which may be before the remote calls finish.
    async fn confirm(
        self,
        generation: u64,
        deadline: Instant,
        probe_answered: oneshot::Sender<()>,
        mut settled: Settled,
    ) {
        let probe = self.session_probe(generation).wait().await;
        let _ = probe_answered.send(());

        let identity = match probe {
            Ok(Ok(Some(_))) => self.confirm_user(generation, deadline, &mut settled).await,
            Ok(Ok(None)) => {
                info!("No active session; clearing identity");
                self.apply(generation, None);
                self.current_identity()
            }
            Ok(Err(AuthorityError::SessionExpired)) => {
                self.expire(Some(generation));
                self.current_identity()
            }
            Ok(Err(e)) => {
                warn!("Session probe failed, keeping last known identity: {}", e);
                self.current_identity()
            }
            Err(e) => {
                warn!("Session probe aborted, keeping last known identity: {}", e);
                self.current_identity()
            }
        };

        report(&mut settled, identity);
    }

    async fn confirm_user(
        &self,
        generation: u64,
        deadline: Instant,
        settled: &mut Settled,
    ) -> Option<SharedIdentity> {
        let authority = self.inner.authority.clone();
        let user = self
            .within_deadline(deadline, settled, async move {
                authority.get_current_user().await
            })
            .await;

        let user = match user {
            Ok(Ok(Some(user))) => user,
            Ok(Ok(None)) => {
                info!("Authority reports no signed-in user; clearing identity");
                self.apply(generation, None);
                return self.current_identity();
            }
            Ok(Err(AuthorityError::SessionExpired)) => {
                self.expire(Some(generation));
                return self.current_identity();
            }
            Ok(Err(e)) => {
                warn!("Failed to load current user, keeping last known identity: {}", e);
                return self.current_identity();
            }
            Err(e) => {
                warn!("Current user lookup aborted: {}", e);
                return self.current_identity();
            }
        };

        let known = self.known_households(&user.user_id);
        let authority = self.inner.authority.clone();
        let user_id = user.user_id.clone();
        let mut call =
            tokio::spawn(async move { authority.list_household_memberships(&user_id).await });

        match timeout_at(deadline, &mut call).await {
            Ok(joined) => match self.resolve_memberships(joined, known) {
                Some(households) => self.apply_confirmed(generation, &user, households),
                None => {
                    self.expire(Some(generation));
                    self.current_identity()
                }
            },
            Err(_) => {
                warn!(
                    "Household memberships not loaded within {:?}; continuing with {} known",
                    self.inner.settings.reconcile_timeout,
                    known.len()
                );
                let identity = self.apply_confirmed(generation, &user, known);
                report(settled, identity);

                if let Ok(Ok(households)) = call.await {
                    self.apply_late_households(generation, &user.user_id, households);
                }
                self.current_identity()
            }
        }
    }

    /// Await `call` until `deadline`. Past it, report the last known
    /// identity on `settled` and keep waiting for the late result.
    async fn within_deadline<T, F>(
        &self,
        deadline: Instant,
        settled: &mut Settled,
        call: F,
    ) -> Result<T, JoinError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut call = tokio::spawn(call);
        match timeout_at(deadline, &mut call).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    "Reconciliation exceeded {:?}; keeping last known identity",
                    self.inner.settings.reconcile_timeout
                );
                report(settled, self.current_identity());
                call.await
            }
        }
    }

    /// `None` means the session expired.
    fn resolve_memberships(
        &self,
        joined: Result<Result<Vec<HouseholdMembership>, AuthorityError>, JoinError>,
        known: Vec<HouseholdMembership>,
    ) -> Option<Vec<HouseholdMembership>> {
        let failure = match joined {
            Ok(Ok(households)) => return Some(households),
            Ok(Err(AuthorityError::SessionExpired)) => return None,
            Ok(Err(e)) => SessionError::MembershipLoadFailure(e.to_string()),
            Err(e) => SessionError::MembershipLoadFailure(e.to_string()),
        };
        warn!("{}; continuing with {} known household(s)", failure, known.len());
        Some(known)
    }

    fn known_households(&self, user_id: &str) -> Vec<HouseholdMembership> {
        self.current_identity()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.households.clone())
            .unwrap_or_default()
    }

    fn session_probe(&self, generation: u64) -> FlightHandle<ProbeResult> {
        let authority = self.inner.authority.clone();
        self.inner
            .session_probes
            .join_or_start(generation, move || async move { authority.get_session().await })
    }

    fn spawn_reconcile(&self) -> JoinHandle<Option<SharedIdentity>> {
        let this = self.clone();
        tokio::spawn(async move { this.reconcile().await })
    }

    /// Best effort, bounded by the probe timeout.
    async fn remote_sign_out(&self) {
        let authority = self.inner.authority.clone();
        let call = tokio::spawn(async move { authority.sign_out().await });
        let limit = self.inner.settings.session_probe_timeout;

        match timeout(limit, call).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!("Remote sign-out failed: {}", e),
            Ok(Err(e)) => warn!("Remote sign-out aborted: {}", e),
            Err(_) => warn!("Remote sign-out did not answer within {:?}", limit),
        }
    }

    fn begin_sign_in(&self) -> SignIn<'_> {
        let mut generation = self.lock_generation();
        *generation += 1;
        self.inner.sign_ins.fetch_add(1, Ordering::SeqCst);
        SignIn {
            started: *generation,
            sign_ins: &self.inner.sign_ins,
        }
    }

    /// A sign-in landed after a newer transition. Close the session it
    /// opened unless someone is signed in or signing in by now.
    async fn discard_sign_in(&self, user_id: &str) -> SessionError {
        info!(
            "Discarding sign-in of user {}; the session changed while it was in flight",
            user_id
        );
        let others_signing_in = self.inner.sign_ins.load(Ordering::SeqCst) > 1;
        if self.current_identity().is_none() && !others_signing_in {
            self.remote_sign_out().await;
        }
        SessionError::Superseded
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, AuthorityError>>,
    {
        let limit = self.inner.settings.reconcile_timeout;
        match timeout(limit, call).await {
            Ok(result) => result.map_err(SessionError::from),
            Err(_) => Err(SessionError::TimeoutExceeded(limit)),
        }
    }

    // ==================== Applying ====================

    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.inner
            .generation
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn generation(&self) -> u64 {
        *self.lock_generation()
    }

    fn set_state(&self, state: CoordinatorState) {
        self.inner.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    /// Publish the cached identity if nothing is published yet.
    fn publish_cached(&self, generation: u64) -> Option<SharedIdentity> {
        let cached = self.inner.cache.get().filter(|s| s.is_authenticated());

        let current = self.lock_generation();
        if *current == generation && self.inner.publisher.current().is_none() {
            if let Some(snapshot) = cached {
                debug!("Publishing cached identity for user {}", snapshot.user_id);
                self.inner.publisher.publish(Some(Arc::new(snapshot)));
            }
        }
        drop(current);

        self.current_identity()
    }

    /// Publish and persist. Caller holds the generation lock.
    ///
    /// The cache write is blocking file I/O of a few hundred bytes and stays
    /// under the lock so the cache and the publisher change together.
    fn write_through(&self, identity: Option<SharedIdentity>) {
        let persisted = match identity.as_deref() {
            Some(snapshot) => self.inner.cache.set(snapshot),
            None => self.inner.cache.clear(),
        };
        if let Err(e) = persisted {
            warn!("Failed to update identity cache: {}", e);
        }

        let authenticated = identity.as_ref().is_some_and(|s| s.is_authenticated());
        self.inner.publisher.publish_if_changed(identity);

        if self.state() != CoordinatorState::Reconciling {
            self.set_state(CoordinatorState::Settled(Settlement::from_authenticated(
                authenticated,
            )));
        }
    }

    /// Apply a result of work started under `generation`.
    ///
    /// Returns false, leaving everything untouched, if a transition has
    /// happened since.
    fn apply(&self, generation: u64, identity: Option<SharedIdentity>) -> bool {
        let current = self.lock_generation();
        if *current != generation {
            debug!(
                "Discarding result from generation {} (now {})",
                generation, *current
            );
            return false;
        }
        self.write_through(identity);
        true
    }

    fn apply_confirmed(
        &self,
        generation: u64,
        user: &AuthorityUser,
        households: Vec<HouseholdMembership>,
    ) -> Option<SharedIdentity> {
        let snapshot = IdentitySnapshot::new(
            user.user_id.clone(),
            user.email.clone(),
            user.profile.clone(),
            households,
        );
        if self.apply(generation, Some(Arc::new(snapshot))) {
            debug!("Confirmed identity for user {}", user.user_id);
        }
        self.current_identity()
    }

    fn apply_late_households(
        &self,
        generation: u64,
        user_id: &str,
        households: Vec<HouseholdMembership>,
    ) {
        let current = self.lock_generation();
        if *current != generation {
            return;
        }
        let Some(identity) = self.inner.publisher.current() else {
            return;
        };
        if identity.user_id != user_id {
            return;
        }

        info!(
            "Late household memberships arrived for user {} ({} household(s))",
            user_id,
            households.len()
        );
        self.write_through(Some(Arc::new(identity.with_households(households))));
    }

    /// Bump the generation and replace the identity.
    ///
    /// With `expected`, only if the generation still matches. Returns the
    /// replaced identity, or `None` if nothing was done.
    fn transition(
        &self,
        expected: Option<u64>,
        identity: Option<SharedIdentity>,
    ) -> Option<Option<SharedIdentity>> {
        let mut generation = self.lock_generation();
        if expected.is_some_and(|g| g != *generation) {
            return None;
        }
        *generation += 1;
        let replaced = self.inner.publisher.current();

        let authenticated = identity.as_ref().is_some_and(|s| s.is_authenticated());
        self.write_through(identity);
        self.set_state(CoordinatorState::Settled(Settlement::from_authenticated(
            authenticated,
        )));
        Some(replaced)
    }

    /// Forced sign-out after the authority revoked the session.
    fn expire(&self, expected: Option<u64>) {
        let Some(replaced) = self.transition(expected, None) else {
            debug!("Ignoring session expiry reported by superseded work");
            return;
        };

        warn!("Session expired; signed out");
        if replaced.is_some() {
            self.inner.navigator.signed_out(SignOutReason::SessionExpired);
        }
    }
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .field("settings", &self.inner.settings)
            .finish()
    }
}

/// An explicit sign-in in progress, started at generation `started`.
struct SignIn<'a> {
    started: u64,
    sign_ins: &'a AtomicUsize,
}

impl Drop for SignIn<'_> {
    fn drop(&mut self) {
        self.sign_ins.fetch_sub(1, Ordering::SeqCst);
    }
}

fn require_credentials(email: &str, password: &str) -> Result<(), SessionError> {
    if email.is_empty() || password.is_empty() {
        return Err(SessionError::InvalidCredentials(
            "Email and password are required".to_string(),
        ));
    }
    Ok(())
}

fn report(settled: &mut Settled, identity: Option<SharedIdentity>) {
    if let Some(tx) = settled.take() {
        let _ = tx.send(identity);
    }
}
