use crate::auth::session::Session;
use crate::auth::IdentityProvider;
use crate::core::subscription::Subscription;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The two mutually exclusive top-level views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    ChatRoom,
}

/// Chooses the view from the identity provider's session-change events.
pub struct SessionGate {
    session: Option<Session>,
    events: Option<mpsc::UnboundedReceiver<Option<Session>>>,
    subscription: Option<Subscription>,
}

impl SessionGate {
    /// Subscribes to session changes and applies the initial value.
    pub fn mount(provider: &dyn IdentityProvider) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription =
            provider.subscribe_session_changes(Arc::new(move |session: Option<Session>| {
                let _ = tx.send(session);
            }));

        let mut gate = Self {
            session: None,
            events: Some(rx),
            subscription: Some(subscription),
        };
        gate.apply_pending();
        gate
    }

    pub fn view(&self) -> View {
        if self.session.is_some() {
            View::ChatRoom
        } else {
            View::Login
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Waits for the next session event and applies it.
    ///
    /// Returns `false` once the gate is torn down or the provider went away.
    pub async fn next_event(&mut self) -> bool {
        let Some(events) = self.events.as_mut() else {
            return false;
        };
        match events.recv().await {
            Some(session) => {
                self.apply(session);
                true
            }
            None => false,
        }
    }

    /// Applies every queued event. Returns `true` if any was applied.
    pub fn apply_pending(&mut self) -> bool {
        let mut applied = false;
        while let Some(session) = self.events.as_mut().and_then(|rx| rx.try_recv().ok()) {
            self.apply(session);
            applied = true;
        }
        applied
    }

    fn apply(&mut self, session: Option<Session>) {
        let before = self.view();
        self.session = session;
        if self.view() != before {
            tracing::debug!(view = ?self.view(), "session gate switched view");
        }
    }

    /// Releases the subscription; later events are never applied.
    pub fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        if let Some(mut events) = self.events.take() {
            events.close();
        }
    }
}
