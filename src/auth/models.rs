use super::session::Session;
use serde::{Deserialize, Serialize};

/// Body of `accounts:signUp` and `accounts:signInWithPassword`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

/// Response of both password endpoints. Sign-up omits `displayName` and `registered`.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResponse {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Token lifetime in seconds, sent as a decimal string.
    #[serde(default)]
    pub expires_in: Option<String>,
    #[serde(default)]
    pub registered: Option<bool>,
}

impl PasswordResponse {
    pub fn into_session(self, requested_email: &str) -> Session {
        Session {
            uid: self.local_id,
            email: self
                .email
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| requested_email.to_string()),
            display_name: self.display_name.filter(|n| !n.is_empty()),
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in.and_then(|s| s.parse().ok()),
        }
    }
}
