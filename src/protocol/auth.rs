//! Refresh-token grant responses of the accounts service.
//!
//! # Example Response
//!
//! ```json
//! {
//!     "access_token": "BQD...",
//!     "token_type": "Bearer",
//!     "scope": "user-read-playback-state user-modify-playback-state",
//!     "expires_in": 3600,
//!     "refresh_token": "AQB..."
//! }
//! ```
//!
//! `refresh_token` is only present when the accounts service rotates it.

use std::time::Duration;

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DurationSeconds};
use veil::Redact;

/// Access token issued by the refresh-token grant.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Deserialize, Redact)]
pub struct TokenResponse {
    /// Bearer token for Web API calls
    #[redact]
    pub access_token: String,

    #[serde(default)]
    pub token_type: String,

    #[serde(default)]
    pub scope: String,

    /// How long the access token remains valid
    #[serde_as(as = "Option<DurationSeconds<u64, Flexible>>")]
    pub expires_in: Option<Duration>,

    /// Replacement refresh token, if rotated
    #[redact]
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// OAuth2 error response, e.g. for a revoked refresh token.
///
/// ```json
/// { "error": "invalid_grant", "error_description": "Refresh token revoked" }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct AuthError {
    pub error: String,

    #[serde(default)]
    pub error_description: Option<String>,
}

impl AuthError {
    /// Extracts a human readable reason from an error body.
    #[must_use]
    pub fn describe(body: &str, default: &str) -> String {
        match serde_json::from_str::<Self>(body) {
            Ok(Self {
                error,
                error_description: Some(description),
            }) => format!("{error}: {description}"),
            Ok(Self { error, .. }) => error,
            Err(_) => default.to_owned(),
        }
    }
}
