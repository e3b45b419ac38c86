//! The signed-in session and its change notifications.

use crate::core::subscription::{Callback, Listeners, Subscription};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Proof that a user is signed in, as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: Option<u64>,
}

impl Session {
    /// Name shown next to this user's messages: the display name when set, else the email.
    pub fn sender_name(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.email,
        }
    }
}

/// Shared, observable holder of the current session.
#[derive(Clone, Default)]
pub struct SessionState {
    current: Arc<RwLock<Option<Session>>>,
    // Held across store-and-emit and register-and-replay so listeners see
    // changes in the order they were stored.
    notify: Arc<Mutex<()>>,
    listeners: Listeners<Option<Session>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn id_token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|s| s.id_token.clone())
    }

    fn ordered(&self) -> MutexGuard<'_, ()> {
        self.notify
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces the session and notifies every listener.
    pub fn set(&self, session: Option<Session>) {
        let _order = self.ordered();
        {
            let mut guard = self
                .current
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = session.clone();
        }
        tracing::debug!(signed_in = session.is_some(), "session changed");
        self.listeners.emit(session);
    }

    /// Registers `callback` and immediately delivers the current value to it.
    ///
    /// Callbacks run while changes are serialized, so they must not call
    /// [`SessionState::set`] or [`SessionState::subscribe`] themselves.
    pub fn subscribe(&self, callback: Callback<Option<Session>>) -> Subscription {
        let _order = self.ordered();
        let subscription = self.listeners.add(Arc::clone(&callback));
        callback(self.current());
        subscription
    }
}
