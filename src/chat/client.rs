use super::feed::LiveFeedController;
use super::form::CredentialForm;
use super::gate::{SessionGate, View};
use crate::auth::IdentityProvider;
use crate::firestore::DocumentStore;
use std::sync::Arc;

/// The component mounted for the current view.
pub enum Screen {
    Login(CredentialForm),
    ChatRoom(LiveFeedController),
}

/// Owns the session gate and swaps the form and the feed as its view changes.
pub struct ChatClient {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    gate: SessionGate,
    screen: Screen,
}

impl ChatClient {
    pub fn mount(provider: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        let gate = SessionGate::mount(provider.as_ref());
        let screen = Self::screen_for(gate.view(), &provider, &store);
        Self {
            provider,
            store,
            gate,
            screen,
        }
    }

    fn screen_for(
        view: View,
        provider: &Arc<dyn IdentityProvider>,
        store: &Arc<dyn DocumentStore>,
    ) -> Screen {
        match view {
            View::Login => {
                Screen::Login(CredentialForm::new(Arc::clone(provider), Arc::clone(store)))
            }
            View::ChatRoom => {
                Screen::ChatRoom(LiveFeedController::mount(Arc::clone(provider), Arc::clone(store)))
            }
        }
    }

    pub fn view(&self) -> View {
        self.gate.view()
    }

    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn form_mut(&mut self) -> Option<&mut CredentialForm> {
        match &mut self.screen {
            Screen::Login(form) => Some(form),
            Screen::ChatRoom(_) => None,
        }
    }

    pub fn feed_mut(&mut self) -> Option<&mut LiveFeedController> {
        match &mut self.screen {
            Screen::ChatRoom(feed) => Some(feed),
            Screen::Login(_) => None,
        }
    }

    /// Waits until the gate or the mounted feed applies an event.
    ///
    /// Returns `false` when the session subscription has ended.
    pub async fn next_change(&mut self) -> bool {
        let gate = &mut self.gate;
        let screen = &mut self.screen;

        let alive = tokio::select! {
            alive = gate.next_event() => alive,
            _ = async {
                match screen {
                    Screen::ChatRoom(feed) => feed.next_event().await,
                    Screen::Login(_) => std::future::pending::<bool>().await,
                }
            } => true,
        };

        self.sync_screen();
        alive
    }

    /// Applies everything queued for the gate and the feed.
    pub fn apply_pending(&mut self) -> bool {
        let mut applied = self.gate.apply_pending();
        if let Screen::ChatRoom(feed) = &mut self.screen {
            applied |= feed.apply_pending();
        }
        self.sync_screen();
        applied
    }

    /// Mounts the component for the gate's view if it is not mounted yet.
    fn sync_screen(&mut self) {
        let mounted = match &self.screen {
            Screen::Login(_) => View::Login,
            Screen::ChatRoom(_) => View::ChatRoom,
        };
        let view = self.gate.view();
        if view == mounted {
            return;
        }

        if let Screen::ChatRoom(feed) = &mut self.screen {
            feed.teardown();
        }
        self.screen = Self::screen_for(view, &self.provider, &self.store);
        tracing::info!(?view, "switched view");
    }

    pub fn teardown(&mut self) {
        if let Screen::ChatRoom(feed) = &mut self.screen {
            feed.teardown();
        }
        self.gate.teardown();
    }
}
