//! Credential storage for the session subsystem.
//!
//! Two scopes mirror the two lifetimes the dashboard shell cares about:
//! tab-scoped state disappears with the process, browser-scoped state
//! survives until explicitly cleared. The tab scope is the source of truth
//! for "is this tab logged in"; the browser scope holds only the rotation
//! copy of the refresh token.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Storage key names, shared with the backend/shell contract.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const USER_UNIQUE_ID: &str = "userUniqueId";
    pub const IS_ADMIN: &str = "isAdmin";
    pub const USER_ID: &str = "userId";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const SESSION_ACTIVE: &str = "sessionActive";
    pub const IS_REFRESHING: &str = "isRefreshing";
    pub const IS_CLOSING: &str = "isClosing";

    /// Every key a session leaves behind, in both scopes.
    pub const ALL: &[&str] = &[
        ACCESS_TOKEN,
        REFRESH_TOKEN,
        USER_UNIQUE_ID,
        IS_ADMIN,
        USER_ID,
        DISPLAY_NAME,
        SESSION_ACTIVE,
        IS_REFRESHING,
        IS_CLOSING,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Cleared when the tab/process goes away.
    Tab,
    /// Survives tab close until explicitly cleared.
    Browser,
}

/// A flat string key-value store. Implementations never let an I/O failure
/// escape this boundary; they log and carry on.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// The one shared mutable resource of the subsystem: a pair of stores,
/// one per scope.
pub struct CredentialStore {
    tab: Box<dyn KeyValueStore>,
    browser: Box<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(tab: Box<dyn KeyValueStore>, browser: Box<dyn KeyValueStore>) -> Self {
        Self { tab, browser }
    }

    /// Both scopes in memory; the default for tests and for hosts that manage
    /// their own persistence.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()))
    }

    fn scope(&self, scope: Scope) -> &dyn KeyValueStore {
        match scope {
            Scope::Tab => self.tab.as_ref(),
            Scope::Browser => self.browser.as_ref(),
        }
    }

    pub fn get(&self, scope: Scope, key: &str) -> Option<String> {
        self.scope(scope).get(key)
    }

    pub fn set(&self, scope: Scope, key: &str, value: &str) {
        self.scope(scope).set(key, value);
    }

    pub fn remove(&self, scope: Scope, key: &str) {
        self.scope(scope).remove(key);
    }

    /// True when the given key holds the literal string `"true"`.
    pub fn flag(&self, scope: Scope, key: &str) -> bool {
        self.get(scope, key).as_deref() == Some("true")
    }

    /// Remove every session and rotation key from both scopes. A partial
    /// clear would leave a record violating the token-pairing invariant,
    /// so this is the only sanctioned way to erase a session.
    pub fn clear_all(&self) {
        for key in keys::ALL {
            self.tab.remove(key);
            self.browser.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_are_independent() {
        let store = CredentialStore::in_memory();
        store.set(Scope::Tab, keys::ACCESS_TOKEN, "A1");
        store.set(Scope::Browser, keys::REFRESH_TOKEN, "R1");

        assert_eq!(store.get(Scope::Tab, keys::ACCESS_TOKEN).as_deref(), Some("A1"));
        assert_eq!(store.get(Scope::Browser, keys::ACCESS_TOKEN), None);
        assert_eq!(store.get(Scope::Browser, keys::REFRESH_TOKEN).as_deref(), Some("R1"));
        assert_eq!(store.get(Scope::Tab, keys::REFRESH_TOKEN), None);
    }

    #[test]
    fn test_clear_all_empties_both_scopes() {
        let store = CredentialStore::in_memory();
        for key in keys::ALL {
            store.set(Scope::Tab, key, "x");
            store.set(Scope::Browser, key, "x");
        }

        store.clear_all();

        for key in keys::ALL {
            assert_eq!(store.get(Scope::Tab, key), None, "tab key {key} survived clear");
            assert_eq!(store.get(Scope::Browser, key), None, "browser key {key} survived clear");
        }
    }

    #[test]
    fn test_flag_requires_literal_true() {
        let store = CredentialStore::in_memory();
        assert!(!store.flag(Scope::Tab, keys::SESSION_ACTIVE));
        store.set(Scope::Tab, keys::SESSION_ACTIVE, "1");
        assert!(!store.flag(Scope::Tab, keys::SESSION_ACTIVE));
        store.set(Scope::Tab, keys::SESSION_ACTIVE, "true");
        assert!(store.flag(Scope::Tab, keys::SESSION_ACTIVE));
    }
}
