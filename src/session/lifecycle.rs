//! Close-vs-reload detection at page teardown.
//!
//! The host shell reports two ordered signals for every navigation:
//! `before_unload` first (carrying the navigation-timing entry type), then
//! `page_hide` at actual teardown. A reload leaves the transient
//! `isRefreshing` flag for the next boot to consume; anything else is
//! treated as a close and triggers one best-effort beacon logout.
//!
//! This is a heuristic - there is no stronger close signal in a browser
//! environment, and beacon delivery is not guaranteed. The server-side
//! refresh-token TTL remains the authoritative backstop for revocation.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::{AuthClient, LogoutMode};
use crate::store::{keys, CredentialStore, Scope};

/// Navigation-timing entry type as reported by the host shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// The page is reloading; the session must survive.
    Reload,
    /// Anything else, including an absent entry: assume the tab is closing.
    Other,
}

pub struct LifecycleDetector {
    store: Arc<CredentialStore>,
    transport: AuthClient,
}

impl LifecycleDetector {
    pub fn new(store: Arc<CredentialStore>, transport: AuthClient) -> Self {
        Self { store, transport }
    }

    /// First unload signal. Only flags are written here; `before_unload`
    /// always precedes `page_hide`, and the decision is acted on there.
    pub fn on_before_unload(&self, navigation: NavigationKind) {
        match navigation {
            NavigationKind::Reload => {
                debug!("Unload reports reload; session will persist across boot");
                self.store.set(Scope::Tab, keys::IS_REFRESHING, "true");
            }
            NavigationKind::Other => {
                debug!("Unload without reload marker; treating as close");
                self.store.set(Scope::Tab, keys::IS_CLOSING, "true");
            }
        }
    }

    /// Second unload signal, fired at actual teardown. On a genuine close
    /// with a live token, capture the tokens, erase the session, then issue
    /// exactly one beacon logout. The `isClosing` flag never survives this
    /// call, whatever the outcome.
    pub async fn on_page_hide(&self) {
        if !self.store.flag(Scope::Tab, keys::IS_CLOSING) {
            self.store.remove(Scope::Tab, keys::IS_CLOSING);
            return;
        }

        let access_token = self.store.get(Scope::Tab, keys::ACCESS_TOKEN);
        let refresh_token = self
            .store
            .get(Scope::Tab, keys::REFRESH_TOKEN)
            .or_else(|| self.store.get(Scope::Browser, keys::REFRESH_TOKEN));

        if access_token.is_none() {
            // Anonymous tab closing; nothing to revoke.
            self.store.remove(Scope::Tab, keys::IS_CLOSING);
            return;
        }

        // Clear-then-notify, same ordering as every other logout path.
        self.store.clear_all();

        if let Some(refresh_token) = refresh_token {
            if let Err(e) = self
                .transport
                .logout(access_token.as_deref(), &refresh_token, LogoutMode::Beacon)
                .await
            {
                // Best effort only; the tab is going away either way.
                warn!(error = %e, "Beacon logout failed during teardown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn detector_with_store() -> (Arc<CredentialStore>, LifecycleDetector) {
        let store = Arc::new(CredentialStore::in_memory());
        let transport = AuthClient::new(&Config::default(), Arc::clone(&store)).expect("client");
        let detector = LifecycleDetector::new(Arc::clone(&store), transport);
        (store, detector)
    }

    #[test]
    fn test_reload_sets_refreshing_flag_only() {
        let (store, detector) = detector_with_store();
        detector.on_before_unload(NavigationKind::Reload);

        assert!(store.flag(Scope::Tab, keys::IS_REFRESHING));
        assert!(!store.flag(Scope::Tab, keys::IS_CLOSING));
    }

    #[test]
    fn test_other_navigation_sets_closing_flag() {
        let (store, detector) = detector_with_store();
        detector.on_before_unload(NavigationKind::Other);

        assert!(store.flag(Scope::Tab, keys::IS_CLOSING));
        assert!(!store.flag(Scope::Tab, keys::IS_REFRESHING));
    }

    #[tokio::test]
    async fn test_page_hide_without_closing_flag_is_noop() {
        let (store, detector) = detector_with_store();
        store.set(Scope::Tab, keys::ACCESS_TOKEN, "A1");
        store.set(Scope::Tab, keys::REFRESH_TOKEN, "R1");

        detector.on_page_hide().await;

        // Session untouched: this was a reload path.
        assert_eq!(store.get(Scope::Tab, keys::ACCESS_TOKEN).as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_page_hide_closing_without_token_clears_flag_only() {
        let (store, detector) = detector_with_store();
        detector.on_before_unload(NavigationKind::Other);

        detector.on_page_hide().await;

        assert!(!store.flag(Scope::Tab, keys::IS_CLOSING));
    }
}
