//! Bearer token lifecycle.
//!
//! [`TokenManager`] owns the [`Credentials`] and the current
//! [`AccessToken`]. It does not perform I/O itself: the integration actor
//! asks it for the credentials to refresh with ([`TokenManager::begin_refresh`])
//! and hands it the outcome ([`TokenManager::finish_refresh`]). In return it
//! learns when to schedule the next refresh.
//!
//! At most one refresh is in flight at any time. Timer fires or
//! authentication failures that arrive while one is in flight are ignored;
//! its completion re-arms the timer.

use std::{fmt, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::time::Instant;
use veil::Redact;

use crate::{error::Result, protocol::auth::TokenResponse, secrets::Secrets};

/// OAuth2 client credentials and the long-lived refresh token.
#[derive(Clone, PartialEq, Eq, Redact)]
pub struct Credentials {
    pub client_id: String,

    #[redact]
    pub client_secret: String,

    #[redact]
    pub refresh_token: String,
}

impl Credentials {
    /// Value for a `Basic` authorization header: `base64(id:secret)`.
    #[must_use]
    pub fn basic_auth(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
    }
}

impl From<Secrets> for Credentials {
    fn from(secrets: Secrets) -> Self {
        Self {
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
            refresh_token: secrets.refresh_token,
        }
    }
}

/// Short-lived bearer token.
#[derive(Clone, PartialEq, Eq, Redact)]
pub struct AccessToken {
    #[redact]
    token: String,
    expires_at: Instant,
}

impl AccessToken {
    #[must_use]
    pub fn new(token: String, time_to_live: Duration) -> Self {
        Self {
            token,
            expires_at: Instant::now() + time_to_live,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    #[must_use]
    pub fn time_to_live(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token)
    }
}

/// Outcome of a successful refresh.
#[derive(Clone, PartialEq, Eq, Redact)]
pub struct Refreshed {
    /// Delay after which the next refresh should run.
    pub delay: Duration,

    /// Refresh token handed out by the accounts service, if it rotated.
    #[redact]
    pub rotated: Option<String>,
}

#[derive(Debug)]
pub struct TokenManager {
    credentials: Credentials,
    access_token: Option<AccessToken>,
    in_flight: bool,
}

impl TokenManager {
    /// Refresh this long before the access token actually expires.
    pub const EXPIRATION_THRESHOLD: Duration = Duration::from_secs(60);

    /// Lifetime assumed when the accounts service omits `expires_in`.
    pub const DEFAULT_TIME_TO_LIVE: Duration = Duration::from_secs(3600);

    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            access_token: None,
            in_flight: false,
        }
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    /// The bearer token to authenticate calls with.
    ///
    /// Returns `None` until the first refresh succeeded. An expired token is
    /// still returned: the remote rejects it and that triggers a refresh.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.access_token
            .as_ref()
            .map(AccessToken::as_str)
            .filter(|token| !token.is_empty())
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.in_flight
    }

    /// Delay until the refresh for a token living `expires_in`.
    ///
    /// Tokens that live shorter than the threshold are refreshed right away.
    #[must_use]
    pub fn refresh_delay(expires_in: Duration) -> Duration {
        expires_in.saturating_sub(Self::EXPIRATION_THRESHOLD)
    }

    /// Marks a refresh as in flight and returns the credentials to use.
    ///
    /// Returns `None` if a refresh is already in flight.
    pub fn begin_refresh(&mut self) -> Option<Credentials> {
        if self.in_flight {
            return None;
        }

        self.in_flight = true;
        Some(self.credentials.clone())
    }

    /// Applies the outcome of the refresh in flight.
    ///
    /// On success the new access token supersedes the previous one and a
    /// rotated refresh token replaces the stored one. On failure the previous
    /// access token is kept.
    pub fn finish_refresh(&mut self, result: Result<TokenResponse>) -> Result<Refreshed> {
        self.in_flight = false;
        let response = result?;

        let time_to_live = response.expires_in.unwrap_or_else(|| {
            warn!(
                "token response without expiry; assuming {}s",
                Self::DEFAULT_TIME_TO_LIVE.as_secs()
            );
            Self::DEFAULT_TIME_TO_LIVE
        });

        if self
            .access_token
            .as_ref()
            .is_none_or(|current| current.as_str() != response.access_token)
        {
            debug!("got new access token");
        }
        self.access_token = Some(AccessToken::new(response.access_token, time_to_live));

        let rotated = response
            .refresh_token
            .filter(|token| !token.is_empty() && *token != self.credentials.refresh_token);
        if let Some(ref token) = rotated {
            debug!("refresh token rotated");
            self.credentials.refresh_token.clone_from(token);
        }

        let delay = Self::refresh_delay(time_to_live);
        debug!(
            "access token time to live: {}s; refreshing in {}s",
            time_to_live.as_secs(),
            delay.as_secs()
        );

        Ok(Refreshed { delay, rotated })
    }
}
