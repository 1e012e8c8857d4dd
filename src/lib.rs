//! Session-lifecycle core for the OpsTrack admin dashboard.
//!
//! Everything the shell needs to decide between the public and protected
//! layouts lives here: the credential stores (tab- and browser-scoped),
//! the auth transport with silent token rotation, the idle-timeout
//! countdown, close-vs-reload detection at teardown, and the
//! `SessionController` state machine that ties them together.
//!
//! Typical wiring:
//!
//! ```no_run
//! # async fn wire() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use opstrack_session::{Config, CredentialStore, SessionController};
//!
//! let config = Config::from_env();
//! let store = Arc::new(CredentialStore::in_memory());
//! let session = SessionController::new(&config, store)?;
//!
//! if session.is_authenticated() {
//!     // render the protected shell
//! } else {
//!     session.login("alice", "secret").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod session;
pub mod store;

pub use api::{AuthClient, AuthError, LoginResponse, LogoutMode};
pub use config::Config;
pub use session::{
    ActivityKind, IdleMonitor, LifecycleDetector, NavigationKind, SessionController, SessionRecord,
};
pub use store::{CredentialStore, FileStore, KeyValueStore, MemoryStore, Scope};
