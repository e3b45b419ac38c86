//! Email/password accounts through the Identity Toolkit REST API.
//!
//! [`FirebaseAuth`] signs users up and in with an API key, keeps the resulting
//! [`Session`] in a shared [`SessionState`], and notifies subscribers whenever
//! it changes.

pub mod models;
pub mod session;

#[cfg(test)]
mod tests;

use self::models::{PasswordRequest, PasswordResponse};
use self::session::{Session, SessionState};
use crate::config::FirebaseConfig;
use crate::core::subscription::{Callback, Subscription};
use crate::core::{build_client, FirebaseErrorResponse};
use async_trait::async_trait;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("API error: {0}")]
    ApiError(String),
    /// A rejection the user can act on (bad password, account exists, ...).
    #[error("{message}")]
    Provider { code: String, message: String },
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AuthError {
    /// The web SDK style code (`auth/email-already-in-use`) for provider rejections.
    pub fn code(&self) -> Option<&str> {
        match self {
            AuthError::Provider { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// The identity provider as the chat components see it.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_account(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Calls `callback` with the current session right away and again on every change.
    fn subscribe_session_changes(&self, callback: Callback<Option<Session>>) -> Subscription;
}

#[derive(Clone)]
pub struct FirebaseAuth {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    session: SessionState,
}

impl FirebaseAuth {
    pub fn new(config: &FirebaseConfig, session: SessionState) -> Self {
        Self {
            client: build_client(None, config.max_retries),
            base_url: config.identity_toolkit_url(),
            api_key: config.api_key.clone(),
            session,
        }
    }

    pub fn new_with_client(
        client: ClientWithMiddleware,
        base_url: String,
        api_key: String,
        session: SessionState,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            session,
        }
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session.current()
    }

    async fn password_request(
        &self,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = format!("{}/accounts:{}?key={}", self.base_url, endpoint, self.api_key);
        let request = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<FirebaseErrorResponse>(&text) {
                Ok(error) => provider_error(&error.error.message),
                Err(_) => AuthError::ApiError(format!("{} failed {}: {}", endpoint, status, text)),
            });
        }

        let body: PasswordResponse = response.json().await?;
        let session = body.into_session(email);
        self.session.set(Some(session.clone()));
        Ok(session)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn create_account(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        tracing::debug!(email, "creating account");
        self.password_request("signUp", email, password).await
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        tracing::debug!(email, "signing in");
        self.password_request("signInWithPassword", email, password).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // ID tokens are bearer tokens; forgetting them locally is the whole sign-out.
        self.session.set(None);
        Ok(())
    }

    fn subscribe_session_changes(&self, callback: Callback<Option<Session>>) -> Subscription {
        self.session.subscribe(callback)
    }
}

/// Maps an Identity Toolkit error message (`EMAIL_EXISTS`,
/// `WEAK_PASSWORD : Password should be at least 6 characters`) onto the text
/// the Firebase web SDK shows for it.
pub(crate) fn provider_error(raw: &str) -> AuthError {
    let (server_code, detail) = match raw.split_once(" : ") {
        Some((code, detail)) => (code.trim(), Some(detail.trim())),
        None => (raw.trim(), None),
    };

    let code = match server_code {
        "EMAIL_EXISTS" => "auth/email-already-in-use",
        "INVALID_LOGIN_CREDENTIALS" => "auth/invalid-credential",
        "INVALID_PASSWORD" => "auth/wrong-password",
        "EMAIL_NOT_FOUND" => "auth/user-not-found",
        "USER_DISABLED" => "auth/user-disabled",
        "INVALID_EMAIL" => "auth/invalid-email",
        "MISSING_EMAIL" => "auth/missing-email",
        "MISSING_PASSWORD" => "auth/missing-password",
        "WEAK_PASSWORD" => "auth/weak-password",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "auth/too-many-requests",
        "OPERATION_NOT_ALLOWED" | "PASSWORD_LOGIN_DISABLED" => "auth/operation-not-allowed",
        other if other.starts_with("API key not valid") => {
            "auth/api-key-not-valid.-please-pass-a-valid-api-key."
        }
        _ => "auth/internal-error",
    };

    let message = match detail {
        Some(detail) => format!("Firebase: {} ({}).", detail, code),
        None => format!("Firebase: Error ({}).", code),
    };

    AuthError::Provider {
        code: code.to_string(),
        message,
    }
}
