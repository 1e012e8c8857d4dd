//! HTTP transport for the session subsystem.
//!
//! `AuthClient` owns the three authentication calls and the interceptor
//! path used by every business-domain request: bearer attachment on the
//! way out, one transparent refresh-and-retry on a 401 on the way back.
//! It is stateless apart from reading/rotating tokens in the shared
//! `CredentialStore`; persisting a full session is the controller's job.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::store::{keys, CredentialStore, Scope};

use super::AuthError;

/// Bounded timeout for the beacon-mode logout fired during teardown.
/// Short enough not to stall shutdown, long enough for one round trip.
const BEACON_TIMEOUT_SECS: u64 = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(rename = "userUniqueId", default)]
    pub user_unique_id: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// How a logout call is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutMode {
    /// Ordinary async call; local cleanup never waits on its result.
    Normal,
    /// Fire-and-forget during page teardown: tight timeout, response
    /// ignored. No delivery guarantee - the server-side token TTL is the
    /// real backstop for revocation.
    Beacon,
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling, and the store and refresh guard are shared.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
    store: Arc<CredentialStore>,
    refresh_guard: Arc<Mutex<()>>,
}

impl AuthClient {
    pub fn new(config: &Config, store: Arc<CredentialStore>) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            store,
            refresh_guard: Arc::new(Mutex::new(())),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn access_token(&self) -> Option<String> {
        self.store.get(Scope::Tab, keys::ACCESS_TOKEN)
    }

    /// Tab-scoped refresh token first; the browser-scoped rotation copy is
    /// the fallback after a tab-scoped clear.
    fn refresh_token(&self) -> Option<String> {
        self.store
            .get(Scope::Tab, keys::REFRESH_TOKEN)
            .or_else(|| self.store.get(Scope::Browser, keys::REFRESH_TOKEN))
    }

    /// Authenticate and return the identity payload. The caller persists
    /// the result; nothing is written here.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let response = self
            .client
            .post(self.api_url("/auth/login"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| AuthError::Network(format!("Failed to parse login response: {e}")))
        } else if status.is_client_error() {
            debug!(%status, "Login rejected");
            Err(AuthError::InvalidCredentials)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AuthError::from_status(status, &body))
        }
    }

    /// Create a new account. Stateless passthrough; registering does not
    /// log the user in.
    pub async fn register(&self, user: &serde_json::Value) -> Result<serde_json::Value, AuthError> {
        let response = self
            .client
            .post(self.api_url("/auth/register"))
            .json(user)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .map_err(|e| AuthError::Network(format!("Failed to parse register response: {e}")))
    }

    /// Rotate the access token using the refresh token.
    ///
    /// Single-flight: concurrent stale-token detections collapse to one
    /// network call. Whoever acquires the guard first performs the
    /// rotation; everyone queued behind it sees the token has changed
    /// since their request was rejected and reuses it without a second
    /// call.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let observed = self.access_token();
        self.refresh_observed(observed.as_deref()).await
    }

    /// `observed` is the token the rejected request actually carried; it
    /// must be captured before the request is sent, or a rotation landing
    /// mid-flight would be indistinguishable from no rotation at all.
    async fn refresh_observed(&self, observed: Option<&str>) -> Result<String, AuthError> {
        let _guard = self.refresh_guard.lock().await;

        if let Some(current) = self.access_token() {
            if observed != Some(current.as_str()) {
                debug!("Access token already rotated by a concurrent refresh");
                return Ok(current);
            }
        }

        let refresh_token = self.refresh_token().ok_or(AuthError::SessionExpired)?;

        let response = self
            .client
            .post(self.api_url("/auth/refresh"))
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Refresh token rejected");
            return Err(AuthError::SessionExpired);
        }

        let rotated: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Network(format!("Failed to parse refresh response: {e}")))?;

        self.store.set(Scope::Tab, keys::ACCESS_TOKEN, &rotated.access_token);
        debug!("Access token rotated");
        Ok(rotated.access_token)
    }

    /// Notify the server of logout. Tokens are passed in rather than read
    /// from the store because the controller clears storage before this
    /// call is made (clear-then-notify); the response body is ignored in
    /// both modes.
    pub async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: &str,
        mode: LogoutMode,
    ) -> Result<(), AuthError> {
        let mut request = self
            .client
            .post(self.api_url("/auth/logout"))
            .json(&serde_json::json!({ "refreshToken": refresh_token }));

        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        if mode == LogoutMode::Beacon {
            request = request.timeout(Duration::from_secs(BEACON_TIMEOUT_SECS));
        }

        let response = request.send().await?;
        debug!(status = %response.status(), ?mode, "Logout call completed");
        Ok(())
    }

    /// GET through the interceptor path.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        let response = self.send_protected(Method::GET, path, None).await?;
        response
            .json()
            .await
            .map_err(|e| AuthError::Network(format!("Failed to parse response from {path}: {e}")))
    }

    /// POST through the interceptor path.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, AuthError> {
        let body = serde_json::to_value(body)
            .map_err(|e| AuthError::Network(format!("Failed to encode request body: {e}")))?;
        let response = self.send_protected(Method::POST, path, Some(body)).await?;
        response
            .json()
            .await
            .map_err(|e| AuthError::Network(format!("Failed to parse response from {path}: {e}")))
    }

    /// The interceptor: attach the current bearer token, and on a 401
    /// perform exactly one transparent refresh-and-retry. A second 401
    /// means the session is gone for good.
    async fn send_protected(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response, AuthError> {
        let url = self.api_url(path);

        let token = self.access_token();
        let response = self.send_once(&method, &url, token.as_deref(), body.as_ref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_response(response).await;
        }

        debug!(url = %url, "Access token rejected; refreshing");
        let rotated = self.refresh_observed(token.as_deref()).await?;

        let response = self.send_once(&method, &url, Some(&rotated), body.as_ref()).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %url, "Still unauthorized after refresh");
            return Err(AuthError::SessionExpired);
        }
        Self::check_response(response).await
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        token: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, AuthError> {
        let mut request = self.client.request(method.clone(), url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, AuthError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(AuthError::from_status(status, &body))
        }
    }
}
