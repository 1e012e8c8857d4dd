use serde::{Deserialize, Serialize};

use crate::api::{AuthError, LoginResponse};
use crate::store::{keys, CredentialStore, Scope};

/// The in-memory shape of a live session: both tokens plus the read-only
/// identity attributes returned at login.
///
/// Invariant: a record only exists with both tokens. A store holding one
/// token without the other is reported as stale so the caller can clear it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub is_admin: bool,
    pub display_name: String,
    pub user_unique_id: String,
}

impl From<LoginResponse> for SessionRecord {
    fn from(response: LoginResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            user_id: response.user_id,
            is_admin: response.is_admin,
            display_name: response.display_name,
            user_unique_id: response.user_unique_id,
        }
    }
}

impl SessionRecord {
    /// Write the full record: identity and tokens tab-scoped with
    /// `sessionActive="true"`, and the refresh token alone browser-scoped
    /// as the rotation record. The access token is never duplicated into
    /// the browser scope.
    pub fn persist(&self, store: &CredentialStore) {
        store.set(Scope::Tab, keys::ACCESS_TOKEN, &self.access_token);
        store.set(Scope::Tab, keys::REFRESH_TOKEN, &self.refresh_token);
        store.set(Scope::Tab, keys::USER_ID, &self.user_id);
        store.set(Scope::Tab, keys::IS_ADMIN, if self.is_admin { "true" } else { "false" });
        store.set(Scope::Tab, keys::DISPLAY_NAME, &self.display_name);
        store.set(Scope::Tab, keys::USER_UNIQUE_ID, &self.user_unique_id);
        store.set(Scope::Tab, keys::SESSION_ACTIVE, "true");

        store.set(Scope::Browser, keys::REFRESH_TOKEN, &self.refresh_token);
    }

    /// Read a record back from the tab scope.
    ///
    /// `Ok(None)` means no session at all. `Err(StaleSession)` means the
    /// pairing invariant is violated (exactly one token present); the
    /// caller is expected to clear storage.
    pub fn load(store: &CredentialStore) -> Result<Option<Self>, AuthError> {
        let access_token = store.get(Scope::Tab, keys::ACCESS_TOKEN);
        let refresh_token = store.get(Scope::Tab, keys::REFRESH_TOKEN);

        let (access_token, refresh_token) = match (access_token, refresh_token) {
            (Some(a), Some(r)) => (a, r),
            (None, None) => return Ok(None),
            _ => return Err(AuthError::StaleSession),
        };

        Ok(Some(Self {
            access_token,
            refresh_token,
            user_id: store.get(Scope::Tab, keys::USER_ID).unwrap_or_default(),
            is_admin: store.flag(Scope::Tab, keys::IS_ADMIN),
            display_name: store.get(Scope::Tab, keys::DISPLAY_NAME).unwrap_or_default(),
            user_unique_id: store.get(Scope::Tab, keys::USER_UNIQUE_ID).unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SessionRecord {
        SessionRecord {
            access_token: "A1".to_string(),
            refresh_token: "R1".to_string(),
            user_id: "7".to_string(),
            is_admin: false,
            display_name: "Alice Smith".to_string(),
            user_unique_id: "u-7f3a".to_string(),
        }
    }

    #[test]
    fn test_persist_then_load_round_trips() {
        let store = CredentialStore::in_memory();
        record().persist(&store);

        let loaded = SessionRecord::load(&store).expect("load").expect("present");
        assert_eq!(loaded.access_token, "A1");
        assert_eq!(loaded.refresh_token, "R1");
        assert_eq!(loaded.user_id, "7");
        assert!(!loaded.is_admin);
        assert_eq!(loaded.display_name, "Alice Smith");
    }

    #[test]
    fn test_persist_sets_session_active_and_rotation_copy() {
        let store = CredentialStore::in_memory();
        record().persist(&store);

        assert!(store.flag(Scope::Tab, keys::SESSION_ACTIVE));
        assert_eq!(store.get(Scope::Browser, keys::REFRESH_TOKEN).as_deref(), Some("R1"));
        // The access token must never leak into the browser scope.
        assert_eq!(store.get(Scope::Browser, keys::ACCESS_TOKEN), None);
    }

    #[test]
    fn test_empty_store_loads_as_absent() {
        let store = CredentialStore::in_memory();
        assert!(SessionRecord::load(&store).expect("load").is_none());
    }

    #[test]
    fn test_one_sided_tokens_are_stale() {
        let store = CredentialStore::in_memory();
        store.set(Scope::Tab, keys::ACCESS_TOKEN, "A1");
        assert!(matches!(SessionRecord::load(&store), Err(AuthError::StaleSession)));

        let store = CredentialStore::in_memory();
        store.set(Scope::Tab, keys::REFRESH_TOKEN, "R1");
        assert!(matches!(SessionRecord::load(&store), Err(AuthError::StaleSession)));
    }
}
