//! Configuration of an integration instance.

use std::time::Duration;

use url::Url;

use crate::{
    error::{Error, Result},
    poller::Poller,
    token::Credentials,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,

    pub user_agent: String,

    /// Id of the host's media-player entity this integration drives.
    pub entity_id: String,

    pub poll_interval: Duration,

    /// Base of the Web API, ending in `/`.
    pub api_url: Url,

    /// Base of the accounts service, ending in `/`.
    pub accounts_url: Url,

    pub credentials: Credentials,
}

impl Config {
    pub const DEFAULT_API_URL: &'static str = "https://api.spotify.com/";
    pub const DEFAULT_ACCOUNTS_URL: &'static str = "https://accounts.spotify.com/";

    /// Configuration with the public Spotify endpoints and default polling.
    pub fn new(credentials: Credentials, entity_id: impl Into<String>) -> Result<Self> {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();

        let entity_id = entity_id.into();
        if entity_id.trim().is_empty() {
            return Err(Error::invalid_argument("entity id is empty"));
        }

        // Additional `User-Agent` string checks on top of `reqwest::HeaderValue`.
        let illegal_chars = |chr| chr == '/' || chr == ';';
        if app_name.is_empty()
            || app_name.contains(illegal_chars)
            || app_version.is_empty()
            || app_version.contains(illegal_chars)
        {
            return Err(Error::invalid_argument(format!(
                "application name and/or version invalid (\"{app_name}\"; \"{app_version}\")"
            )));
        }

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let mut os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));
        if os_version.is_empty() || os_version.contains(illegal_chars) {
            warn!("os version invalid (\"{os_version}\"), leaving it out of the user agent");
            os_version = String::from("0");
        }

        let user_agent = format!("{app_name}/{app_version} (Rust; {os_name}/{os_version})");
        trace!("user agent: {user_agent}");

        Ok(Self {
            app_name,
            app_version,
            user_agent,
            entity_id,
            poll_interval: Poller::DEFAULT_INTERVAL,
            api_url: Self::base_url(Self::DEFAULT_API_URL)?,
            accounts_url: Self::base_url(Self::DEFAULT_ACCOUNTS_URL)?,
            credentials,
        })
    }

    /// Parses a base URL, making sure relative paths join below it.
    pub fn base_url(url: &str) -> Result<Url> {
        let mut url = Url::parse(url)?;
        if url.cannot_be_a_base() {
            return Err(Error::invalid_argument(format!("{url} cannot be a base url")));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(url)
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_api_url(mut self, url: &str) -> Result<Self> {
        self.api_url = Self::base_url(url)?;
        Ok(self)
    }

    pub fn with_accounts_url(mut self, url: &str) -> Result<Self> {
        self.accounts_url = Self::base_url(url)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            client_id: "id".to_owned(),
            client_secret: "secret".to_owned(),
            refresh_token: "refresh".to_owned(),
        }
    }

    #[test]
    fn defaults_to_spotify() {
        let config = Config::new(credentials(), "media_player.spotify").unwrap();

        assert_eq!(config.api_url.as_str(), "https://api.spotify.com/");
        assert_eq!(config.accounts_url.as_str(), "https://accounts.spotify.com/");
        assert_eq!(config.poll_interval, Duration::from_secs(4));
        assert!(config.user_agent.starts_with("spotbridge/"));
        assert!(config.user_agent.contains("(Rust; "));
    }

    #[test]
    fn rejects_empty_entity_id() {
        assert!(Config::new(credentials(), " ").is_err());
    }

    #[test]
    fn normalizes_base_urls() {
        assert_eq!(
            Config::base_url("http://127.0.0.1:8080").unwrap().as_str(),
            "http://127.0.0.1:8080/"
        );
        assert_eq!(
            Config::base_url("http://127.0.0.1:8080/mock")
                .unwrap()
                .join("v1/me/player")
                .unwrap()
                .as_str(),
            "http://127.0.0.1:8080/mock/v1/me/player"
        );
        assert!(Config::base_url("mailto:someone@example.com").is_err());
        assert!(Config::base_url("not a url").is_err());
    }
}
