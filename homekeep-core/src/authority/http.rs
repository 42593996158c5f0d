//! REST client for the Homekeep identity service.
//!
//! ## Endpoints
//!
//! - `POST /auth/sign-up`, `POST /auth/sign-in`: open a session
//! - `GET /auth/session`: probe (and possibly refresh) the session token
//! - `GET /auth/user`: user owning the session
//! - `GET /users/{user_id}/households`: memberships
//! - `POST /households`: create a household
//! - `POST /auth/sign-out`: close the session
//!
//! Authenticated requests carry `Authorization: Bearer <token>`. The token
//! is mirrored to a file when one is configured so it survives restarts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::{
    AuthorityError, AuthorityUser, CreatedHousehold, IdentityAuthority, SessionInvalidated,
    SignedIn,
};
use crate::identity::{HouseholdMembership, UserProfile};

/// Capacity of the invalidation broadcast channel.
const INVALIDATION_CAPACITY: usize = 8;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    user_id: String,
    session_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionProbeResponse {
    session_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    user_id: String,
    email: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateHouseholdRequest<'a> {
    name: &'a str,
    owner_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HouseholdResponse {
    household_id: String,
    household_name: String,
}

/// Error body returned by the identity service.
#[derive(Debug, Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Identity authority reached over HTTP.
#[derive(Debug)]
pub struct HttpAuthority {
    server_url: String,
    client: reqwest::Client,
    token: RwLock<Option<String>>,
    token_file: Option<PathBuf>,
    invalidations: broadcast::Sender<SessionInvalidated>,
}

impl HttpAuthority {
    /// Creates a client that keeps its session token in memory only.
    pub fn new(server_url: impl Into<String>) -> Self {
        let (invalidations, _) = broadcast::channel(INVALIDATION_CAPACITY);
        Self {
            server_url: server_url.into(),
            client: reqwest::Client::new(),
            token: RwLock::new(None),
            token_file: None,
            invalidations,
        }
    }

    /// Creates a client that persists its session token to `token_file`,
    /// resuming any token already stored there.
    pub fn with_token_file(server_url: impl Into<String>, token_file: PathBuf) -> Self {
        let mut authority = Self::new(server_url);
        let stored = load_token(&token_file);
        authority.token = RwLock::new(stored);
        authority.token_file = Some(token_file);
        authority
    }

    /// Returns the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Returns true if a session token is currently held.
    pub fn has_token(&self) -> bool {
        self.token_read().is_some()
    }

    fn token_read(&self) -> RwLockReadGuard<'_, Option<String>> {
        self.token.read().unwrap_or_else(|e| e.into_inner())
    }

    fn token_write(&self) -> RwLockWriteGuard<'_, Option<String>> {
        self.token.write().unwrap_or_else(|e| e.into_inner())
    }

    fn current_token(&self) -> Option<String> {
        self.token_read().clone()
    }

    fn store_token(&self, token: &str) {
        *self.token_write() = Some(token.to_string());

        if let Some(path) = &self.token_file {
            if let Err(e) = save_token(path, token) {
                tracing::warn!("Failed to persist session token {}: {}", path.display(), e);
            }
        }
    }

    /// Drops the held token. Returns the token that was dropped, if any.
    fn drop_token(&self) -> Option<String> {
        let dropped = self.token_write().take();

        if let Some(path) = &self.token_file {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!("Failed to remove session token {}: {}", path.display(), e)
                }
            }
        }

        dropped
    }

    /// Builds an HTTP URL for a given path.
    fn build_url(&self, path: &str) -> String {
        let base_url = if !self.server_url.starts_with("http://")
            && !self.server_url.starts_with("https://")
        {
            format!("http://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bearer {}", token))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AuthorityError> {
        request
            .send()
            .await
            .map_err(|e| AuthorityError::Network(e.to_string()))
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AuthorityError> {
        response
            .json()
            .await
            .map_err(|e| AuthorityError::Decode(e.to_string()))
    }

    /// Reads `{error, message}` from a failed response.
    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        let body: ErrorBody = response.json().await.unwrap_or_default();

        body.message
            .or(body.error)
            .unwrap_or_else(|| format!("Server returned status {}", status))
    }

    async fn rejected(response: reqwest::Response) -> AuthorityError {
        let status = response.status().as_u16();
        AuthorityError::Rejected {
            status,
            message: Self::error_message(response).await,
        }
    }

    /// Shared handling for sign-in and sign-up responses.
    async fn open_session(&self, response: reqwest::Response) -> Result<SignedIn, AuthorityError> {
        match response.status() {
            status if status.is_success() => {
                let session: SessionResponse = Self::decode(response).await?;
                self.store_token(&session.session_token);
                Ok(SignedIn {
                    user_id: session.user_id,
                    session_token: session.session_token,
                })
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::CONFLICT => Err(
                AuthorityError::InvalidCredentials(Self::error_message(response).await),
            ),
            _ => Err(Self::rejected(response).await),
        }
    }
}

#[async_trait]
impl IdentityAuthority for HttpAuthority {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &UserProfile,
    ) -> Result<SignedIn, AuthorityError> {
        let body = SignUpRequest {
            email,
            password,
            first_name: profile.first_name.as_deref(),
            last_name: profile.last_name.as_deref(),
        };

        let response = self
            .send(self.client.post(self.build_url("/auth/sign-up")).json(&body))
            .await?;

        self.open_session(response).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthorityError> {
        let body = SignInRequest { email, password };

        let response = self
            .send(self.client.post(self.build_url("/auth/sign-in")).json(&body))
            .await?;

        self.open_session(response).await
    }

    async fn get_session(&self) -> Result<Option<String>, AuthorityError> {
        // No token, no session: skip the round-trip
        let Some(token) = self.current_token() else {
            return Ok(None);
        };

        let request = self.authorized(self.client.get(self.build_url("/auth/session")), &token);
        let response = self.send(request).await?;

        match response.status() {
            status if status.is_success() => {
                let probe: SessionProbeResponse = Self::decode(response).await?;
                if probe.session_token != token {
                    self.store_token(&probe.session_token);
                }
                Ok(Some(probe.session_token))
            }
            StatusCode::UNAUTHORIZED => {
                if self.drop_token().is_some() {
                    // Nobody listening is fine
                    let _ = self
                        .invalidations
                        .send(SessionInvalidated::new("Session rejected by authority"));
                }
                Err(AuthorityError::SessionExpired)
            }
            _ => Err(Self::rejected(response).await),
        }
    }

    async fn get_current_user(&self) -> Result<Option<AuthorityUser>, AuthorityError> {
        let Some(token) = self.current_token() else {
            return Ok(None);
        };

        let request = self.authorized(self.client.get(self.build_url("/auth/user")), &token);
        let response = self.send(request).await?;

        match response.status() {
            status if status.is_success() => {
                let user: UserResponse = Self::decode(response).await?;
                Ok(Some(AuthorityUser {
                    user_id: user.user_id,
                    email: user.email,
                    profile: UserProfile::new(user.first_name, user.last_name),
                }))
            }
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(None),
            _ => Err(Self::rejected(response).await),
        }
    }

    async fn list_household_memberships(
        &self,
        user_id: &str,
    ) -> Result<Vec<HouseholdMembership>, AuthorityError> {
        let token = self.current_token().ok_or(AuthorityError::SessionExpired)?;

        let path = format!("/users/{}/households", urlencoding::encode(user_id));
        let request = self.authorized(self.client.get(self.build_url(&path)), &token);
        let response = self.send(request).await?;

        match response.status() {
            status if status.is_success() => Self::decode(response).await,
            StatusCode::UNAUTHORIZED => Err(AuthorityError::SessionExpired),
            _ => Err(Self::rejected(response).await),
        }
    }

    async fn create_household(
        &self,
        name: &str,
        owner_id: &str,
    ) -> Result<CreatedHousehold, AuthorityError> {
        let token = self.current_token().ok_or(AuthorityError::SessionExpired)?;

        let body = CreateHouseholdRequest { name, owner_id };
        let request = self
            .authorized(self.client.post(self.build_url("/households")), &token)
            .json(&body);
        let response = self.send(request).await?;

        match response.status() {
            status if status.is_success() => {
                let household: HouseholdResponse = Self::decode(response).await?;
                Ok(CreatedHousehold {
                    household_id: household.household_id,
                    household_name: household.household_name,
                })
            }
            StatusCode::UNAUTHORIZED => Err(AuthorityError::SessionExpired),
            _ => Err(Self::rejected(response).await),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthorityError> {
        // The local token goes away whatever the server says
        let Some(token) = self.drop_token() else {
            return Ok(());
        };

        let request = self.authorized(self.client.post(self.build_url("/auth/sign-out")), &token);
        let response = self.send(request).await?;

        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(Self::rejected(response).await)
        }
    }

    fn subscribe_invalidations(&self) -> Option<broadcast::Receiver<SessionInvalidated>> {
        Some(self.invalidations.subscribe())
    }
}

fn load_token(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn save_token(path: &Path, token: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, token)
}
