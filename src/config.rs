//! Firebase web-app configuration.
//!
//! The shape matches the config object the Firebase console hands out for web
//! apps, so an exported `firebase-config.json` can be loaded as-is.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use url::Url;

const IDENTITY_TOOLKIT_V1_API: &str = "https://identitytoolkit.googleapis.com/v1";
const FIRESTORE_V1_API: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE_ID: &str = "(default)";

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid URL for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseConfig {
    pub api_key: String,
    #[serde(default)]
    pub auth_domain: Option<String>,
    pub project_id: String,
    #[serde(default)]
    pub storage_bucket: Option<String>,
    #[serde(default)]
    pub messaging_sender_id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub measurement_id: Option<String>,
    /// Firestore database id, `(default)` unless set.
    #[serde(default)]
    pub database_id: Option<String>,
    /// Overrides the Identity Toolkit root, e.g. the auth emulator's
    /// `http://localhost:9099/identitytoolkit.googleapis.com/v1`.
    #[serde(default)]
    pub identity_toolkit_url: Option<String>,
    /// Overrides the Firestore REST root, e.g. `http://localhost:8080/v1`.
    #[serde(default)]
    pub firestore_url: Option<String>,
    /// Transient-failure retries for HTTP calls. Zero disables the retry layer.
    #[serde(default)]
    pub max_retries: u32,
}

impl FirebaseConfig {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    /// Loads a JSON config file and validates it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: FirebaseConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a config from `FIREBASE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let config = FirebaseConfig {
            api_key: var("FIREBASE_API_KEY").ok_or(ConfigError::Missing("FIREBASE_API_KEY"))?,
            project_id: var("FIREBASE_PROJECT_ID")
                .ok_or(ConfigError::Missing("FIREBASE_PROJECT_ID"))?,
            auth_domain: var("FIREBASE_AUTH_DOMAIN"),
            storage_bucket: var("FIREBASE_STORAGE_BUCKET"),
            messaging_sender_id: var("FIREBASE_MESSAGING_SENDER_ID"),
            app_id: var("FIREBASE_APP_ID"),
            measurement_id: var("FIREBASE_MEASUREMENT_ID"),
            database_id: var("FIREBASE_DATABASE_ID"),
            identity_toolkit_url: var("FIREBASE_IDENTITY_TOOLKIT_URL"),
            firestore_url: var("FIREBASE_FIRESTORE_URL"),
            max_retries: var("FIREBASE_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("apiKey"));
        }
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::Missing("projectId"));
        }
        for (field, value) in [
            ("identityToolkitUrl", &self.identity_toolkit_url),
            ("firestoreUrl", &self.firestore_url),
        ] {
            if let Some(value) = value {
                Url::parse(value).map_err(|source| ConfigError::InvalidUrl { field, source })?;
            }
        }
        Ok(())
    }

    pub fn identity_toolkit_url(&self) -> String {
        self.identity_toolkit_url
            .as_deref()
            .unwrap_or(IDENTITY_TOOLKIT_V1_API)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn firestore_url(&self) -> String {
        self.firestore_url
            .as_deref()
            .unwrap_or(FIRESTORE_V1_API)
            .trim_end_matches('/')
            .to_string()
    }

    /// Resource name of the database, `projects/{p}/databases/{d}`.
    pub fn database_name(&self) -> String {
        format!(
            "projects/{}/databases/{}",
            self.project_id,
            self.database_id.as_deref().unwrap_or(DEFAULT_DATABASE_ID)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_console_export() {
        let raw = r#"{
            "apiKey": "AIza-test",
            "authDomain": "chat-test.firebaseapp.com",
            "projectId": "chat-test",
            "storageBucket": "chat-test.firebasestorage.app",
            "messagingSenderId": "1234",
            "appId": "1:1234:web:abcd"
        }"#;

        let config: FirebaseConfig = serde_json::from_str(raw).unwrap();
        config.validate().unwrap();
        assert_eq!(config.project_id, "chat-test");
        assert_eq!(config.database_name(), "projects/chat-test/databases/(default)");
        assert_eq!(config.firestore_url(), "https://firestore.googleapis.com/v1");
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn rejects_missing_api_key() {
        let config = FirebaseConfig::new("  ", "chat-test");
        assert!(matches!(config.validate(), Err(ConfigError::Missing("apiKey"))));
    }

    #[test]
    fn rejects_bad_override_url() {
        let mut config = FirebaseConfig::new("key", "chat-test");
        config.firestore_url = Some("not a url".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { field: "firestoreUrl", .. })
        ));
    }

    #[test]
    fn overrides_strip_trailing_slash() {
        let mut config = FirebaseConfig::new("key", "chat-test");
        config.identity_toolkit_url = Some("http://localhost:9099/identitytoolkit.googleapis.com/v1/".into());
        config.database_id = Some("chat".into());
        assert_eq!(
            config.identity_toolkit_url(),
            "http://localhost:9099/identitytoolkit.googleapis.com/v1"
        );
        assert_eq!(config.database_name(), "projects/chat-test/databases/chat");
    }
}
