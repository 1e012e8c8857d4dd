use thiserror::Error;

/// The only errors that cross the transport boundary. Raw transport
/// failures are folded into `Network`; nothing else leaks.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Stale session record: tokens present without a live session flag")]
    StaleSession,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl AuthError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            // The cutoff must land on a char boundary or the slice panics
            // on multi-byte UTF-8 bodies.
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Map a non-success response on a protected call. 401 means the access
    /// token is no longer honored; everything else is a transport-level
    /// failure as far as the session subsystem is concerned.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => AuthError::SessionExpired,
            _ => AuthError::Network(format!("Status {}: {}", status, Self::truncate_body(body))),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    // Timeouts land here too: a bounded timeout is treated as a network
    // failure, never left pending.
    fn from(e: reqwest::Error) -> Self {
        AuthError::Network(e.to_string())
    }
}
