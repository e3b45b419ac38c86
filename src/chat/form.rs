use super::models::UserProfile;
use super::{ChatError, USERS_COLLECTION};
use crate::auth::session::Session;
use crate::auth::IdentityProvider;
use crate::firestore::DocumentStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const WELCOME_TEXT: &str = "Welcome to Chat App";
pub const WELCOME_LETTER_DELAY: Duration = Duration::from_millis(150);

pub const BACKGROUND_GRADIENTS: [&str; 5] = [
    "linear-gradient(135deg, #5c258d, #4389a2)",
    "linear-gradient(135deg, #4776e6, #8e54e9)",
    "linear-gradient(135deg, #1fa2ff, #12d8fa)",
    "linear-gradient(135deg, #FF61D2, #FE9090)",
    "linear-gradient(135deg, #0f0c29, #a6ffcb)",
];
pub const BACKGROUND_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

impl AuthMode {
    pub fn toggled(self) -> Self {
        match self {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        }
    }
}

/// The login background; advances on a fixed timer regardless of form input.
#[derive(Debug, Clone, Copy)]
pub struct BackgroundRotation {
    started: Instant,
}

impl BackgroundRotation {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn current(&self) -> &'static str {
        Self::at(self.started.elapsed())
    }

    /// The gradient shown `elapsed` after the form appeared.
    pub fn at(elapsed: Duration) -> &'static str {
        let step = (elapsed.as_millis() / BACKGROUND_INTERVAL.as_millis()) as usize;
        BACKGROUND_GRADIENTS[step % BACKGROUND_GRADIENTS.len()]
    }
}

/// Each character of the welcome line with the delay before it animates in.
pub fn welcome_letters() -> Vec<(char, Duration)> {
    WELCOME_TEXT
        .chars()
        .enumerate()
        .map(|(i, c)| (c, WELCOME_LETTER_DELAY * i as u32))
        .collect()
}

/// Email/password form that signs the user up or in.
pub struct CredentialForm {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    mode: AuthMode,
    email: String,
    password: String,
    alert: Option<String>,
    background: BackgroundRotation,
}

impl CredentialForm {
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            provider,
            store,
            mode: AuthMode::default(),
            email: String::new(),
            password: String::new(),
            alert: None,
            background: BackgroundRotation::start(),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Switches between sign-in and sign-up. Entered fields are kept.
    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    /// The message of the last failed submit, if not yet dismissed.
    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn dismiss_alert(&mut self) -> Option<String> {
        self.alert.take()
    }

    pub fn background(&self) -> &'static str {
        self.background.current()
    }

    /// Signs up or in with the entered credentials and writes the profile.
    ///
    /// On failure the error message becomes the form's alert and the entered
    /// fields are left as they are.
    pub async fn submit(&mut self) -> Result<Session, ChatError> {
        self.alert = None;
        let result = match self.mode {
            AuthMode::SignUp => self.sign_up().await,
            AuthMode::SignIn => self.sign_in().await,
        };

        if let Err(e) = &result {
            tracing::error!(mode = ?self.mode, error = %e, "authentication failed");
            self.alert = Some(e.to_string());
        }
        result
    }

    async fn sign_up(&self) -> Result<Session, ChatError> {
        let session = self.provider.create_account(&self.email, &self.password).await?;

        let profile = UserProfile::for_new_account(&session, Utc::now()).into_fields()?;
        self.store
            .upsert(USERS_COLLECTION, &session.uid, profile, false)
            .await?;

        tracing::info!(email = %session.email, "signed up");
        Ok(session)
    }

    async fn sign_in(&self) -> Result<Session, ChatError> {
        let session = self.provider.authenticate(&self.email, &self.password).await?;

        self.store
            .upsert(USERS_COLLECTION, &session.uid, UserProfile::online(), true)
            .await?;

        tracing::info!(email = %session.email, "signed in");
        Ok(session)
    }
}
