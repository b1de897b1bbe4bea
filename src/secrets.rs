//! Client credentials and refresh token stored in a TOML file.
//!
//! The refresh token is long-lived but the accounts service may rotate it on
//! any refresh. [`SecretsFile`] implements [`CredentialStore`] by rewriting
//! the `refresh_token` key, keeping any other keys untouched. The new
//! contents go to a temporary file next to the original which then replaces
//! it, so a failed write never leaves a truncated file behind.
//!
//! ```toml
//! client_id = "0123456789abcdef0123456789abcdef"
//! client_secret = "fedcba9876543210fedcba9876543210"
//! refresh_token = "AQD..."
//! ```

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use veil::Redact;

use crate::error::{Error, Result};

/// Durable storage for the refresh token.
///
/// Called from the integration actor whenever the accounts service hands
/// out a new refresh token.
pub trait CredentialStore: Send {
    fn store_refresh_token(&mut self, refresh_token: &str) -> Result<()>;
}

/// Contents of the secrets file.
#[derive(Clone, PartialEq, Eq, Deserialize, Redact)]
pub struct Secrets {
    pub client_id: String,

    #[redact]
    pub client_secret: String,

    #[redact]
    pub refresh_token: String,
}

impl Secrets {
    fn validate(self) -> Result<Self> {
        for (key, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("refresh_token", &self.refresh_token),
        ] {
            if value.trim().is_empty() {
                return Err(Error::invalid_argument(format!("{key} is empty")));
            }
        }

        Ok(self)
    }
}

/// Secrets file on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretsFile {
    path: PathBuf,
}

impl SecretsFile {
    /// Secrets files are small. Anything larger is not ours.
    const MAX_SIZE: u64 = 1024;

    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<String> {
        // Prevent out-of-memory condition: secrets file should be small.
        let file_size = fs::metadata(&self.path)?.len();
        if file_size > Self::MAX_SIZE {
            return Err(Error::out_of_range(format!(
                "{} is too large ({file_size} bytes)",
                self.path.display()
            )));
        }

        fs::read_to_string(&self.path).map_err(Into::into)
    }

    /// Loads and validates the secrets.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is too large, is not valid
    /// TOML or has an empty or missing key.
    pub fn load(&self) -> Result<Secrets> {
        let contents = self.read()?;
        let secrets = toml::from_str::<Secrets>(&contents).map_err(|e| {
            Error::invalid_argument(format!("{} format is invalid: {e}", self.path.display()))
        })?;

        secrets.validate()
    }
}

impl CredentialStore for SecretsFile {
    fn store_refresh_token(&mut self, refresh_token: &str) -> Result<()> {
        let mut table = self.read()?.parse::<toml::Table>()?;
        table.insert(
            "refresh_token".to_owned(),
            toml::Value::String(refresh_token.to_owned()),
        );

        let contents = toml::to_string(&table)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(contents.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;

        debug!("stored new refresh token in {}", self.path.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn secrets_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_secrets() {
        let file = secrets_file(
            "client_id = \"id\"\nclient_secret = \"secret\"\nrefresh_token = \"refresh\"\n",
        );
        let secrets = SecretsFile::new(file.path()).load().unwrap();

        assert_eq!(secrets.client_id, "id");
        assert_eq!(secrets.client_secret, "secret");
        assert_eq!(secrets.refresh_token, "refresh");
    }

    #[test]
    fn redacts_secrets_in_debug_output() {
        let secrets = Secrets {
            client_id: "id".to_owned(),
            client_secret: "supersecret".to_owned(),
            refresh_token: "refreshtoken".to_owned(),
        };
        let debug = format!("{secrets:?}");

        assert!(!debug.contains("supersecret"));
        assert!(!debug.contains("refreshtoken"));
    }

    #[test]
    fn rejects_empty_keys() {
        let file = secrets_file(
            "client_id = \"id\"\nclient_secret = \"\"\nrefresh_token = \"refresh\"\n",
        );
        let err = SecretsFile::new(file.path()).load().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn rejects_oversized_files() {
        let file = secrets_file(&"#".repeat(2048));
        let err = SecretsFile::new(file.path()).load().unwrap_err();
        assert_eq!(err.kind, ErrorKind::OutOfRange);
    }

    #[test]
    fn rotates_refresh_token_in_place() {
        let file = secrets_file(
            "client_id = \"id\"\nclient_secret = \"secret\"\nrefresh_token = \"old\"\n",
        );
        let mut store = SecretsFile::new(file.path());
        store.store_refresh_token("new").unwrap();

        let secrets = store.load().unwrap();
        assert_eq!(secrets.refresh_token, "new");
        assert_eq!(secrets.client_id, "id");
        assert_eq!(secrets.client_secret, "secret");
    }

    #[test]
    fn rotation_replaces_the_file_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(
            &path,
            "client_id = \"id\"\nclient_secret = \"secret\"\nrefresh_token = \"old\"\n",
        )
        .unwrap();

        let mut store = SecretsFile::new(&path);
        store.store_refresh_token("new").unwrap();
        store.store_refresh_token("newer").unwrap();

        assert_eq!(store.load().unwrap().refresh_token, "newer");
        let entries = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(entries, ["secrets.toml"]);
    }

    #[test]
    fn failed_rotation_keeps_the_old_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(&path, "refresh_token = [\"not a table value\"").unwrap();

        let mut store = SecretsFile::new(&path);
        assert!(store.store_refresh_token("new").is_err());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "refresh_token = [\"not a table value\""
        );
    }
}
