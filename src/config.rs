use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    digest::HashAlgorithm,
    error::{Error, Result},
};

/// Settings for reaching the signing authority and running container operations.
#[derive(Clone, Serialize, Deserialize)]
pub struct Settings {
    /// URL of the signing authority
    ///
    /// Any `scheme://` URL is accepted here; each authority checks the
    /// schemes it can reach.
    pub endpoint: String,
    /// User name for the signing authority
    pub username: String,
    /// Password for the signing authority
    pub password: String,
    /// Per-request timeout for signing calls, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries of a failed signing call before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Hash algorithm for data files and manifest imprints
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// Parent directory for scratch workspaces; system temp dir if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

impl Settings {
    /// File name looked up when no settings path is given.
    pub const DEFAULT_FILE: &'static str = "settings.json";

    /// Loads and validates settings from a JSON file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the settings document.
    ///
    /// # Returns
    ///
    /// The validated settings, or an error if the file is unreadable, malformed or invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(Error::io(path))?;
        let settings = Self::from_json_str(&contents)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Parses and validates a JSON settings document.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks that the settings can be used to reach an authority.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config("'endpoint' must not be empty".to_owned()));
        }
        let has_scheme = self
            .endpoint
            .split_once("://")
            .is_some_and(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty());
        if !has_scheme {
            return Err(Error::Config(format!(
                "'endpoint' must be a URL with a scheme, got '{}'",
                self.endpoint
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("'timeout_secs' must be positive".to_owned()));
        }
        Ok(())
    }

    /// Signing request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("hash_algorithm", &self.hash_algorithm)
            .field("scratch_dir", &self.scratch_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_settings_use_defaults() {
        let settings = Settings::from_json_str(
            r#"{ "endpoint": "https://signer.example.com/sign", "username": "anon", "password": "secret" }"#,
        )
        .unwrap();

        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert_eq!(settings.max_retries, 2);
        assert_eq!(settings.hash_algorithm, HashAlgorithm::Sha256);
        assert!(settings.scratch_dir.is_none());
    }

    #[test]
    fn optional_fields_are_read() {
        let settings = Settings::from_json_str(
            r#"{
                "endpoint": "http://localhost:8080",
                "username": "anon",
                "password": "secret",
                "timeout_secs": 5,
                "max_retries": 0,
                "hash_algorithm": "SHA512",
                "scratch_dir": "/var/tmp/containers"
            }"#,
        )
        .unwrap();

        assert_eq!(settings.timeout_secs, 5);
        assert_eq!(settings.max_retries, 0);
        assert_eq!(settings.hash_algorithm, HashAlgorithm::Sha512);
        assert_eq!(
            settings.scratch_dir,
            Some(PathBuf::from("/var/tmp/containers"))
        );
    }

    #[test]
    fn missing_credentials_fail_to_parse() {
        let result = Settings::from_json_str(r#"{ "endpoint": "https://signer.example.com" }"#);

        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        for endpoint in ["", "signer.example.com", "://signer", "https://"] {
            let result = Settings::from_json_str(&format!(
                r#"{{ "endpoint": "{endpoint}", "username": "anon", "password": "secret" }}"#
            ));

            assert!(matches!(result, Err(Error::Config(_))), "{endpoint}");
        }
    }

    #[test]
    fn non_http_endpoints_are_accepted() {
        let settings = Settings::from_json_str(
            r#"{ "endpoint": "ksi+tcp://gateway.example.com:3332", "username": "anon", "password": "secret" }"#,
        )
        .unwrap();

        assert_eq!(settings.endpoint, "ksi+tcp://gateway.example.com:3332");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = Settings::from_json_str(
            r#"{ "endpoint": "https://signer", "username": "anon", "password": "secret", "timeout_secs": 0 }"#,
        );

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = Settings::load(&dir.path().join(Settings::DEFAULT_FILE));

        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn debug_output_redacts_password() {
        let settings = Settings::from_json_str(
            r#"{ "endpoint": "https://signer.example.com", "username": "anon", "password": "hunter2" }"#,
        )
        .unwrap();

        let debug = format!("{settings:?}");

        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
