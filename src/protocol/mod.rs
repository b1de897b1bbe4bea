//! Wire types of the Spotify Web API and accounts service.
//!
//! # Submodules
//!
//! * [`auth`] - refresh-token grant responses
//! * [`player`] - current playback state
//! * [`catalog`] - tracks, albums, artists, playlists and search results
//!
//! The Web API is liberal in what it omits: most fields default when
//! missing or `null`, and list entries that fail to parse are skipped
//! rather than failing the whole response.

pub mod auth;
pub mod catalog;
pub mod player;

use std::fmt::Debug;

use serde::Deserialize;

use crate::error::Result;

/// Parses and logs JSON responses.
///
/// # Logging
///
/// * Success: Logs parsed structure at TRACE level
/// * Parse Error: Logs raw JSON at TRACE level if valid JSON
/// * Invalid JSON: Logs error and raw text at ERROR level
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{origin}: {result:#?}");
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{origin}: {json:#?}");
            } else {
                error!("{origin}: failed parsing response ({e:?})");
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}

/// Error object of a failed Web API call.
///
/// ```json
/// { "error": { "status": 401, "message": "The access token expired" } }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetails,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ApiErrorDetails {
    #[serde(default)]
    pub status: u16,

    #[serde(default)]
    pub message: String,

    /// Set on player errors, e.g. `NO_ACTIVE_DEVICE` or `PREMIUM_REQUIRED`.
    #[serde(default)]
    pub reason: Option<String>,
}

impl ApiError {
    /// Extracts a human readable reason from an error body.
    ///
    /// Error bodies are not guaranteed to be JSON, so this falls back to the
    /// raw body, or the given default when that is empty.
    #[must_use]
    pub fn describe(body: &str, default: &str) -> String {
        match serde_json::from_str::<Self>(body) {
            Ok(Self { error }) => match error.reason {
                Some(reason) => format!("{} ({reason})", error.message),
                None => error.message,
            },
            Err(_) if body.trim().is_empty() => default.to_owned(),
            Err(_) => body.trim().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_api_errors() {
        let body = r#"{"error":{"status":401,"message":"The access token expired"}}"#;
        assert_eq!(
            ApiError::describe(body, "Unauthorized"),
            "The access token expired"
        );

        let body = r#"{"error":{"status":403,"message":"Player command failed: Premium required","reason":"PREMIUM_REQUIRED"}}"#;
        assert_eq!(
            ApiError::describe(body, "Forbidden"),
            "Player command failed: Premium required (PREMIUM_REQUIRED)"
        );
    }

    #[test]
    fn falls_back_to_raw_body() {
        assert_eq!(ApiError::describe("", "Bad Gateway"), "Bad Gateway");
        assert_eq!(
            ApiError::describe("upstream timeout\n", "Bad Gateway"),
            "upstream timeout"
        );
    }
}
