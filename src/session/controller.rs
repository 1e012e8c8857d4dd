//! The session state machine.
//!
//! `SessionController` owns the single authoritative authenticated flag
//! and orchestrates the transport, the credential store, the idle monitor
//! and the lifecycle detector. The rest of the application depends only on
//! this surface: the `is_authenticated` gate (and its watch channel), the
//! action methods, and the interceptor-wrapped request helpers.

use std::sync::Arc;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{AuthClient, AuthError, LogoutMode};
use crate::config::Config;
use crate::store::{keys, CredentialStore, Scope};

use super::idle::{ActivityKind, IdleMonitor};
use super::lifecycle::LifecycleDetector;
use super::record::SessionRecord;

pub struct SessionController {
    store: Arc<CredentialStore>,
    transport: AuthClient,
    idle: IdleMonitor,
    lifecycle: LifecycleDetector,
    state_tx: watch::Sender<bool>,
}

impl SessionController {
    /// Build the controller and run the boot check synchronously: the
    /// initial state is decided before this returns, so the shell never
    /// renders the protected layout on a hunch. Must be called from within
    /// the async runtime (an authenticated boot arms the idle countdown).
    pub fn new(config: &Config, store: Arc<CredentialStore>) -> Result<Arc<Self>> {
        let transport = AuthClient::new(config, Arc::clone(&store))?;
        let lifecycle = LifecycleDetector::new(Arc::clone(&store), transport.clone());
        let idle = IdleMonitor::new(config.idle_window);

        let authenticated = Self::boot_check(&store);

        let (state_tx, _) = watch::channel(authenticated);
        let controller = Arc::new(Self {
            store,
            transport,
            idle,
            lifecycle,
            state_tx,
        });

        if authenticated {
            info!("Boot check passed; restoring authenticated session");
            controller.arm_idle();
        }

        Ok(controller)
    }

    /// Decide the initial state from the storage snapshot: tokens present
    /// AND a liveness flag (`sessionActive`, or `isRefreshing` left by a
    /// reload). Tokens without corroboration are a stale record from an
    /// abnormal termination and are cleared, silently, fail-closed.
    /// The transient unload flags never survive a boot.
    fn boot_check(store: &CredentialStore) -> bool {
        let authenticated = match SessionRecord::load(store) {
            Ok(Some(_)) => {
                let live = store.flag(Scope::Tab, keys::SESSION_ACTIVE)
                    || store.flag(Scope::Tab, keys::IS_REFRESHING);
                if live {
                    // A reload consumed its flag; make the liveness marker
                    // explicit again for the next unload cycle.
                    store.set(Scope::Tab, keys::SESSION_ACTIVE, "true");
                    true
                } else {
                    warn!("Tokens present without a liveness flag; clearing stale session record");
                    store.clear_all();
                    false
                }
            }
            Ok(None) => false,
            Err(AuthError::StaleSession) => {
                warn!("Partial session record (one token without the other); clearing");
                store.clear_all();
                false
            }
            Err(e) => {
                warn!(error = %e, "Unexpected failure reading session record; clearing");
                store.clear_all();
                false
            }
        };

        store.remove(Scope::Tab, keys::IS_REFRESHING);
        store.remove(Scope::Tab, keys::IS_CLOSING);
        authenticated
    }

    // ---- the gate ----

    pub fn is_authenticated(&self) -> bool {
        *self.state_tx.borrow()
    }

    /// Watch channel for the router/shell; replaces ad hoc login/logout
    /// callbacks. The current value is the gate, changes are the events.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state_tx.subscribe()
    }

    // ---- actions ----

    /// `Anonymous -> Authenticated` on success. On failure nothing is
    /// persisted and the state is untouched; the error is one of
    /// `InvalidCredentials` or `Network` for the login form to present.
    pub async fn login(self: &Arc<Self>, username: &str, password: &str) -> Result<(), AuthError> {
        let response = self.transport.login(username, password).await?;
        let record = SessionRecord::from(response);

        record.persist(&self.store);
        self.state_tx.send_replace(true);
        self.arm_idle();

        info!(user_id = %record.user_id, "Login succeeded");
        Ok(())
    }

    /// Explicit (or idle-triggered) logout: clear-then-notify.
    ///
    /// Storage is erased and the state flipped before the network call is
    /// even constructed, so the UI can never show an authenticated state
    /// the user believes is gone, and no in-flight write can repopulate a
    /// cleared key. The server notification runs detached; its failure is
    /// logged and nothing else. Calling this twice is harmless - the
    /// second call finds no tokens and issues no second request.
    pub fn logout(&self) {
        let access_token = self.store.get(Scope::Tab, keys::ACCESS_TOKEN);
        let refresh_token = self
            .store
            .get(Scope::Tab, keys::REFRESH_TOKEN)
            .or_else(|| self.store.get(Scope::Browser, keys::REFRESH_TOKEN));

        self.store.clear_all();
        self.idle.disarm();
        let was_authenticated = self.state_tx.send_replace(false);

        let Some(refresh_token) = refresh_token else {
            debug!("Logout with no refresh token on record; local cleanup only");
            return;
        };

        if was_authenticated {
            info!("Logging out; session cleared locally");
        }

        let transport = self.transport.clone();
        tokio::spawn(async move {
            if let Err(e) = transport
                .logout(access_token.as_deref(), &refresh_token, LogoutMode::Normal)
                .await
            {
                warn!(error = %e, "Logout notification failed; local session already cleared");
            }
        });
    }

    /// The 401 signal path: the server already considers the session dead,
    /// so there is no token worth revoking - local teardown only.
    pub fn on_session_expired(&self) {
        if !self.is_authenticated() {
            return;
        }
        warn!("Session expired upstream; forcing logout");
        self.store.clear_all();
        self.idle.disarm();
        self.state_tx.send_replace(false);
    }

    /// Forwarded user-activity signal; keeps the idle countdown honest.
    pub fn record_activity(&self, kind: ActivityKind) {
        self.idle.activity(kind);
    }

    fn arm_idle(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        self.idle.arm(move || async move {
            info!("Idle timeout; logging out");
            controller.logout();
        });
    }

    // ---- collaborator surface ----

    /// The unload handlers the host shell wires to `beforeunload`/`pagehide`.
    pub fn lifecycle(&self) -> &LifecycleDetector {
        &self.lifecycle
    }

    /// Raw transport access for collaborators that manage their own errors.
    pub fn api(&self) -> &AuthClient {
        &self.transport
    }

    /// GET for business-domain screens: bearer attachment and silent
    /// refresh happen in the transport; a terminal `SessionExpired` also
    /// forces the state machine back to anonymous before propagating.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        self.observe(self.transport.get_json(path).await)
    }

    /// POST for business-domain screens; same expiry handling as `get_json`.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, AuthError> {
        self.observe(self.transport.post_json(path, body).await)
    }

    fn observe<T>(&self, result: Result<T, AuthError>) -> Result<T, AuthError> {
        if let Err(AuthError::SessionExpired) = &result {
            self.on_session_expired();
        }
        result
    }

    // ---- identity, read-only after login ----

    pub fn user_id(&self) -> Option<String> {
        self.store.get(Scope::Tab, keys::USER_ID)
    }

    pub fn is_admin(&self) -> bool {
        self.store.flag(Scope::Tab, keys::IS_ADMIN)
    }

    pub fn display_name(&self) -> Option<String> {
        self.store.get(Scope::Tab, keys::DISPLAY_NAME)
    }

    pub fn user_unique_id(&self) -> Option<String> {
        self.store.get(Scope::Tab, keys::USER_UNIQUE_ID)
    }

    #[cfg(test)]
    pub(crate) fn idle_armed(&self) -> bool {
        self.idle.is_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_session() -> Arc<CredentialStore> {
        let store = Arc::new(CredentialStore::in_memory());
        SessionRecord {
            access_token: "A1".to_string(),
            refresh_token: "R1".to_string(),
            user_id: "7".to_string(),
            is_admin: false,
            display_name: "Alice Smith".to_string(),
            user_unique_id: "u-7f3a".to_string(),
        }
        .persist(&store);
        store
    }

    fn controller(store: Arc<CredentialStore>) -> Arc<SessionController> {
        SessionController::new(&Config::default(), store).expect("controller")
    }

    #[tokio::test]
    async fn test_boot_with_live_session_is_authenticated() {
        let store = store_with_session();
        let controller = controller(Arc::clone(&store));

        assert!(controller.is_authenticated());
        assert!(controller.idle_armed());
        assert_eq!(controller.user_id().as_deref(), Some("7"));
        assert!(!controller.is_admin());
    }

    #[tokio::test]
    async fn test_boot_with_empty_store_is_anonymous() {
        let controller = controller(Arc::new(CredentialStore::in_memory()));
        assert!(!controller.is_authenticated());
        assert!(!controller.idle_armed());
    }

    #[tokio::test]
    async fn test_boot_restores_session_after_reload() {
        let store = store_with_session();
        // A reload cleared sessionActive's tab but left the refresh marker.
        store.remove(Scope::Tab, keys::SESSION_ACTIVE);
        store.set(Scope::Tab, keys::IS_REFRESHING, "true");

        let controller = controller(Arc::clone(&store));

        assert!(controller.is_authenticated());
        assert!(store.flag(Scope::Tab, keys::SESSION_ACTIVE));
        // The transient flag must not outlive the boot.
        assert_eq!(store.get(Scope::Tab, keys::IS_REFRESHING), None);
    }

    #[tokio::test]
    async fn test_boot_clears_uncorroborated_tokens() {
        let store = store_with_session();
        store.remove(Scope::Tab, keys::SESSION_ACTIVE);

        let controller = controller(Arc::clone(&store));

        assert!(!controller.is_authenticated());
        assert_eq!(store.get(Scope::Tab, keys::ACCESS_TOKEN), None);
        assert_eq!(store.get(Scope::Browser, keys::REFRESH_TOKEN), None);
    }

    #[tokio::test]
    async fn test_boot_clears_partial_record() {
        let store = Arc::new(CredentialStore::in_memory());
        store.set(Scope::Tab, keys::ACCESS_TOKEN, "A1");
        store.set(Scope::Tab, keys::SESSION_ACTIVE, "true");

        let controller = controller(Arc::clone(&store));

        assert!(!controller.is_authenticated());
        assert_eq!(store.get(Scope::Tab, keys::ACCESS_TOKEN), None);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent_and_clears_everything() {
        let store = store_with_session();
        let controller = controller(Arc::clone(&store));
        assert!(controller.is_authenticated());

        controller.logout();
        // Second call while the first's detached network request may still
        // be in flight: must be a clean no-op.
        controller.logout();

        assert!(!controller.is_authenticated());
        assert!(!controller.idle_armed());
        assert_eq!(store.get(Scope::Tab, keys::ACCESS_TOKEN), None);
        assert_eq!(store.get(Scope::Tab, keys::REFRESH_TOKEN), None);
        assert_eq!(store.get(Scope::Browser, keys::REFRESH_TOKEN), None);
    }

    #[tokio::test]
    async fn test_session_expired_forces_anonymous_without_network() {
        let store = store_with_session();
        let controller = controller(Arc::clone(&store));
        let mut gate = controller.subscribe();

        controller.on_session_expired();

        assert!(!controller.is_authenticated());
        assert!(!controller.idle_armed());
        assert_eq!(store.get(Scope::Tab, keys::ACCESS_TOKEN), None);
        assert!(gate.has_changed().expect("gate alive"));

        // Repeat while anonymous: silent no-op.
        controller.on_session_expired();
        assert!(!controller.is_authenticated());
    }

    #[tokio::test]
    async fn test_subscribe_observes_logout_transition() {
        let store = store_with_session();
        let controller = controller(store);
        let mut gate = controller.subscribe();
        assert!(*gate.borrow_and_update());

        controller.logout();

        gate.changed().await.expect("gate alive");
        assert!(!*gate.borrow());
    }
}
