//! Session transport: the three authentication calls (login, refresh
//! rotation, logout) plus the interceptor path every business-domain
//! request goes through.
//!
//! The backend uses JWT bearer authentication: a short-lived access token
//! on every protected call, a longer-lived refresh token only for rotation
//! and logout.

pub mod client;
pub mod error;

pub use client::{AuthClient, LoginResponse, LogoutMode};
pub use error::AuthError;
