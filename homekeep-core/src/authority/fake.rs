//! Scripted in-memory authority for coordinator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{
    AuthorityError, AuthorityUser, CreatedHousehold, IdentityAuthority, SessionInvalidated,
    SignedIn,
};
use crate::identity::{HouseholdMembership, HouseholdRole, UserProfile};

/// Long enough to outlast any timeout a test configures.
pub(crate) const FOREVER: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    email: String,
    password: String,
    profile: UserProfile,
}

#[derive(Debug, Default)]
struct Script {
    accounts: Vec<Account>,
    /// (token, user_id) of the open session
    session: Option<(String, String)>,
    memberships: HashMap<String, Vec<HouseholdMembership>>,
    sign_in_delay: Duration,
    session_delay: Duration,
    user_delay: Duration,
    membership_delay: Duration,
    household_delay: Duration,
    session_failure: Option<AuthorityError>,
    membership_failure: Option<AuthorityError>,
    household_failure: Option<AuthorityError>,
}

#[derive(Debug)]
pub(crate) struct FakeAuthority {
    script: Mutex<Script>,
    next_id: AtomicUsize,
    session_calls: AtomicUsize,
    membership_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
    invalidations: broadcast::Sender<SessionInvalidated>,
}

impl FakeAuthority {
    pub(crate) fn new() -> Self {
        let (invalidations, _) = broadcast::channel(4);
        Self {
            script: Mutex::new(Script::default()),
            next_id: AtomicUsize::new(1),
            session_calls: AtomicUsize::new(0),
            membership_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            invalidations,
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn with_account(self, user_id: &str, email: &str, password: &str) -> Self {
        self.script().accounts.push(Account {
            user_id: user_id.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            profile: UserProfile::default(),
        });
        self
    }

    /// Opens a session for an existing account, as if signed in earlier.
    pub(crate) fn with_open_session(self, user_id: &str) -> Self {
        self.script().session = Some((format!("tok-{}", user_id), user_id.to_string()));
        self
    }

    pub(crate) fn with_memberships(
        self,
        user_id: &str,
        memberships: Vec<HouseholdMembership>,
    ) -> Self {
        self.script()
            .memberships
            .insert(user_id.to_string(), memberships);
        self
    }

    pub(crate) fn set_sign_in_delay(&self, delay: Duration) {
        self.script().sign_in_delay = delay;
    }

    pub(crate) fn set_session_delay(&self, delay: Duration) {
        self.script().session_delay = delay;
    }

    pub(crate) fn set_user_delay(&self, delay: Duration) {
        self.script().user_delay = delay;
    }

    pub(crate) fn set_membership_delay(&self, delay: Duration) {
        self.script().membership_delay = delay;
    }

    pub(crate) fn set_household_delay(&self, delay: Duration) {
        self.script().household_delay = delay;
    }

    pub(crate) fn fail_session(&self, error: AuthorityError) {
        self.script().session_failure = Some(error);
    }

    pub(crate) fn clear_session_failure(&self) {
        self.script().session_failure = None;
    }

    pub(crate) fn fail_memberships(&self, error: AuthorityError) {
        self.script().membership_failure = Some(error);
    }

    pub(crate) fn fail_household_creation(&self, error: AuthorityError) {
        self.script().household_failure = Some(error);
    }

    pub(crate) fn close_session(&self) {
        self.script().session = None;
    }

    /// Revokes the session and pushes an invalidation.
    pub(crate) fn revoke(&self, reason: &str) {
        self.close_session();
        let _ = self.invalidations.send(SessionInvalidated::new(reason));
    }

    pub(crate) fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn membership_calls(&self) -> usize {
        self.membership_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn open_session(&self, user_id: &str) -> SignedIn {
        let token = self.next_id("tok-");
        self.script().session = Some((token.clone(), user_id.to_string()));
        SignedIn {
            user_id: user_id.to_string(),
            session_token: token,
        }
    }
}

#[async_trait]
impl IdentityAuthority for FakeAuthority {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &UserProfile,
    ) -> Result<SignedIn, AuthorityError> {
        if self.script().accounts.iter().any(|a| a.email == email) {
            return Err(AuthorityError::InvalidCredentials(
                "Email already registered".to_string(),
            ));
        }

        let user_id = self.next_id("u");
        self.script().accounts.push(Account {
            user_id: user_id.clone(),
            email: email.to_string(),
            password: password.to_string(),
            profile: profile.clone(),
        });

        Ok(self.open_session(&user_id))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthorityError> {
        let delay = self.script().sign_in_delay;
        tokio::time::sleep(delay).await;

        let account = self
            .script()
            .accounts
            .iter()
            .find(|a| a.email == email && a.password == password)
            .cloned()
            .ok_or_else(|| {
                AuthorityError::InvalidCredentials("Email or password is incorrect".to_string())
            })?;

        Ok(self.open_session(&account.user_id))
    }

    async fn get_session(&self) -> Result<Option<String>, AuthorityError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.script().session_delay;
        tokio::time::sleep(delay).await;

        let script = self.script();
        if let Some(error) = &script.session_failure {
            return Err(error.clone());
        }
        Ok(script.session.as_ref().map(|(token, _)| token.clone()))
    }

    async fn get_current_user(&self) -> Result<Option<AuthorityUser>, AuthorityError> {
        // Answers for the session open when the request was made
        let (delay, session_user) = {
            let script = self.script();
            let user_id = script.session.as_ref().map(|(_, user_id)| user_id.clone());
            (script.user_delay, user_id)
        };
        tokio::time::sleep(delay).await;

        let Some(user_id) = session_user else {
            return Ok(None);
        };

        Ok(self
            .script()
            .accounts
            .iter()
            .find(|a| a.user_id == user_id)
            .map(|a| AuthorityUser {
                user_id: a.user_id.clone(),
                email: a.email.clone(),
                profile: a.profile.clone(),
            }))
    }

    async fn list_household_memberships(
        &self,
        user_id: &str,
    ) -> Result<Vec<HouseholdMembership>, AuthorityError> {
        self.membership_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.script().membership_delay;
        tokio::time::sleep(delay).await;

        let script = self.script();
        if let Some(error) = &script.membership_failure {
            return Err(error.clone());
        }
        Ok(script.memberships.get(user_id).cloned().unwrap_or_default())
    }

    async fn create_household(
        &self,
        name: &str,
        owner_id: &str,
    ) -> Result<CreatedHousehold, AuthorityError> {
        let delay = self.script().household_delay;
        tokio::time::sleep(delay).await;

        if let Some(error) = &self.script().household_failure {
            return Err(error.clone());
        }
        if self.script().session.is_none() {
            return Err(AuthorityError::SessionExpired);
        }

        let household_id = self.next_id("h");
        self.script()
            .memberships
            .entry(owner_id.to_string())
            .or_default()
            .push(HouseholdMembership::new(
                household_id.clone(),
                name,
                HouseholdRole::Admin,
            ));

        Ok(CreatedHousehold {
            household_id,
            household_name: name.to_string(),
        })
    }

    async fn sign_out(&self) -> Result<(), AuthorityError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.close_session();
        Ok(())
    }

    fn subscribe_invalidations(&self) -> Option<broadcast::Receiver<SessionInvalidated>> {
        Some(self.invalidations.subscribe())
    }
}
