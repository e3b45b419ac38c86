pub mod auth;
pub mod chat;
pub mod config;
pub mod core;
pub mod firestore;

use auth::session::SessionState;
use auth::FirebaseAuth;
use config::FirebaseConfig;
use firestore::FirebaseFirestore;

/// A configured Firebase web app.
///
/// Every client handed out shares one [`SessionState`], so a sign-in through
/// [`FirebaseApp::auth`] authorizes the requests of [`FirebaseApp::firestore`].
pub struct FirebaseApp {
    config: FirebaseConfig,
    session: SessionState,
}

impl FirebaseApp {
    pub fn new(config: FirebaseConfig) -> Self {
        Self {
            config,
            session: SessionState::new(),
        }
    }

    pub fn config(&self) -> &FirebaseConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn auth(&self) -> FirebaseAuth {
        FirebaseAuth::new(&self.config, self.session.clone())
    }

    pub fn firestore(&self) -> FirebaseFirestore {
        FirebaseFirestore::new(&self.config, self.session.clone())
    }
}
