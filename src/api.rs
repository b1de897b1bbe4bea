//! Outbound calls to the accounts service and the Web API.
//!
//! The [`Api`] trait is the seam between the integration actor and the
//! network: the actor builds [`Request`]s and hands them, with the current
//! bearer token, to whatever implements it. [`WebApi`] is the real
//! implementation over the rate-limited [`http::Client`](crate::http::Client).
//!
//! Only success statuses produce a [`Reply`]. Anything else is an [`Error`]
//! whose kind follows the status code, so an expired token surfaces as
//! [`ErrorKind::Unauthenticated`](crate::error::ErrorKind::Unauthenticated)
//! whichever endpoint was called.

use std::fmt;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method, StatusCode,
};
use url::Url;

use crate::{
    config::Config,
    error::{Error, Result},
    http::Client as HttpClient,
    protocol::{
        self,
        auth::{AuthError, TokenResponse},
        ApiError,
    },
    token::Credentials,
};

/// Logical Web API endpoints.
///
/// Every call is tagged with one so its completion can be routed without
/// looking at the URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET /v1/me/player`
    CurrentPlayback,
    /// `PUT /v1/me/player/play`
    Play,
    /// `PUT /v1/me/player/pause`
    Pause,
    /// `POST /v1/me/player/next`
    Next,
    /// `POST /v1/me/player/previous`
    Previous,
    /// `PUT /v1/me/player/volume`
    Volume,
    /// `PUT /v1/me/player/seek`
    Seek,
    /// `GET /v1/search`
    Search,
    /// `GET /v1/tracks/{id}`
    Track,
    /// `GET /v1/albums/{id}`
    Album,
    /// `GET /v1/artists/{id}`
    Artist,
    /// `GET /v1/playlists/{id}`
    Playlist,
    /// `GET /v1/me/playlists`
    UserPlaylists,
}

impl Endpoint {
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::Play | Self::Pause | Self::Volume | Self::Seek => Method::PUT,
            Self::Next | Self::Previous => Method::POST,
            Self::CurrentPlayback
            | Self::Search
            | Self::Track
            | Self::Album
            | Self::Artist
            | Self::Playlist
            | Self::UserPlaylists => Method::GET,
        }
    }

    /// Path of endpoints without an id in it.
    #[must_use]
    pub const fn fixed_path(self) -> Option<&'static str> {
        match self {
            Self::CurrentPlayback => Some("v1/me/player"),
            Self::Play => Some("v1/me/player/play"),
            Self::Pause => Some("v1/me/player/pause"),
            Self::Next => Some("v1/me/player/next"),
            Self::Previous => Some("v1/me/player/previous"),
            Self::Volume => Some("v1/me/player/volume"),
            Self::Seek => Some("v1/me/player/seek"),
            Self::Search => Some("v1/search"),
            Self::UserPlaylists => Some("v1/me/playlists"),
            Self::Track | Self::Album | Self::Artist | Self::Playlist => None,
        }
    }

    /// Collection the id of a lookup endpoint is resolved in.
    #[must_use]
    pub const fn collection(self) -> Option<&'static str> {
        match self {
            Self::Track => Some("tracks"),
            Self::Album => Some("albums"),
            Self::Artist => Some("artists"),
            Self::Playlist => Some("playlists"),
            _ => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fixed_path() {
            Some(path) => write!(f, "{} /{path}", self.method()),
            None => write!(
                f,
                "{} /v1/{}/{{id}}",
                self.method(),
                self.collection().unwrap_or_default()
            ),
        }
    }
}

/// One Web API call, relative to the API base URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub endpoint: Endpoint,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    /// JSON body. Calls without one are sent with an empty body.
    pub body: Option<serde_json::Value>,
}

impl Request {
    /// Call to an endpoint with a fixed path.
    ///
    /// # Panics
    ///
    /// Panics for lookup endpoints, which need [`Request::lookup`].
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        let path = endpoint
            .fixed_path()
            .unwrap_or_else(|| panic!("{endpoint:?} needs an id"));

        Self {
            endpoint,
            path: path.to_owned(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Lookup of a catalog object by id.
    ///
    /// # Panics
    ///
    /// Panics for endpoints that are not lookups.
    #[must_use]
    pub fn lookup(endpoint: Endpoint, id: &str) -> Self {
        let collection = endpoint
            .collection()
            .unwrap_or_else(|| panic!("{endpoint:?} is not a lookup"));

        Self {
            endpoint,
            path: format!("v1/{collection}/{id}"),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.endpoint.method(), self.path)?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let separator = if i == 0 { '?' } else { '&' };
            write!(f, "{separator}{key}={value}")?;
        }
        Ok(())
    }
}

/// Successful response. `body` is empty for `204 No Content`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
}

/// The network, as seen by the integration.
#[async_trait]
pub trait Api: Send + Sync {
    /// Exchanges the refresh token for a new access token.
    async fn refresh(&self, credentials: &Credentials) -> Result<TokenResponse>;

    /// Performs a Web API call with the given bearer token.
    async fn call(&self, request: &Request, access_token: &str) -> Result<Reply>;
}

/// [`Api`] over HTTPS.
pub struct WebApi {
    http_client: HttpClient,
    api_url: Url,
    accounts_url: Url,
}

impl WebApi {
    const TOKEN_PATH: &'static str = "api/token";

    /// Creates the client owned by one integration instance.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http_client: HttpClient::new(config)?,
            api_url: config.api_url.clone(),
            accounts_url: config.accounts_url.clone(),
        })
    }

    fn url(&self, request: &Request) -> Result<Url> {
        let mut url = self.api_url.join(request.path.trim_start_matches('/'))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(
                request
                    .query
                    .iter()
                    .map(|(key, value)| (*key, value.as_str())),
            );
        }

        Ok(url)
    }
}

#[async_trait]
impl Api for WebApi {
    async fn refresh(&self, credentials: &Credentials) -> Result<TokenResponse> {
        let url = self.accounts_url.join(Self::TOKEN_PATH)?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", &credentials.refresh_token)
            .finish();

        let mut request = self.http_client.post(url, body);
        let headers = request.headers_mut();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", credentials.basic_auth()))?,
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let response = self.http_client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let reason = AuthError::describe(&body, status.canonical_reason().unwrap_or_default());
            return Err(match status {
                // A revoked or unknown refresh token or client.
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                    Error::unauthenticated(reason)
                }
                status => Error::from_status(status, reason),
            });
        }

        let token: TokenResponse = protocol::json(&body, Self::TOKEN_PATH)?;
        if token.access_token.is_empty() {
            return Err(Error::data_loss("token response without access token"));
        }

        Ok(token)
    }

    async fn call(&self, request: &Request, access_token: &str) -> Result<Reply> {
        if access_token.is_empty() {
            return Err(Error::failed_precondition(format!(
                "{request}: no access token"
            )));
        }

        let url = self.url(request)?;
        let body = match &request.body {
            Some(json) => serde_json::to_string(json)?,
            None => String::new(),
        };

        let mut http_request = self
            .http_client
            .request(request.endpoint.method(), url, body);
        let headers = http_request.headers_mut();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {access_token}"))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if request.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let response = self.http_client.execute(http_request).await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(Reply { status, body })
        } else {
            let reason = ApiError::describe(&body, status.canonical_reason().unwrap_or_default());
            Err(Error::from_status(status, format!("{request}: {reason}")))
        }
    }
}
