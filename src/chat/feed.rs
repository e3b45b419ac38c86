//! Live Feed Controller.
//!
//! Mirrors the `messages` collection, ordered by `createdAt`, into local
//! display state and issues message writes.
//!
//! Two subscriptions feed the controller: the query on `messages` and the
//! current session (for sender attribution). Both deliver into a channel the
//! controller owns, and events are applied by whoever drives it through
//! [`LiveFeedController::next_event`] or [`LiveFeedController::apply_pending`],
//! in arrival order. Writes are fire-and-forget: they are issued on a spawned
//! task and failures are only logged.

use super::avatar::{avatar_color, avatar_initial};
use super::models::Message;
use super::{spawn_detached, MESSAGES_COLLECTION};
use crate::auth::session::Session;
use crate::auth::IdentityProvider;
use crate::core::subscription::Subscription;
use crate::firestore::models::Direction;
use crate::firestore::query::Query;
use crate::firestore::snapshot::QuerySnapshot;
use crate::firestore::DocumentStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DEFAULT_VIEWPORT_ROWS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Unsubscribed,
    Subscribed,
}

#[derive(Debug)]
enum FeedEvent {
    Session(Option<Session>),
    Snapshot(QuerySnapshot),
    Deleted,
}

/// What a message looks like in the rendered list.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow<'a> {
    pub message: &'a Message,
    pub is_me: bool,
    /// First message, or the sender differs from the previous message's.
    pub starts_run: bool,
    pub selected: bool,
    /// The delete control is shown for the selected message when it is our own.
    pub can_delete: bool,
    /// `You` for own messages, the sender name otherwise.
    pub label: &'a str,
    pub avatar_color: &'static str,
    pub avatar_initial: String,
}

pub struct LiveFeedController {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    state: FeedState,
    session: Option<Session>,
    messages: Vec<Message>,
    input: String,
    selected: Option<String>,
    emoji_picker_open: bool,
    viewport_rows: usize,
    scroll_offset: usize,
    events_tx: Option<mpsc::UnboundedSender<FeedEvent>>,
    events: Option<mpsc::UnboundedReceiver<FeedEvent>>,
    subscriptions: Vec<Subscription>,
}

impl LiveFeedController {
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            provider,
            store,
            state: FeedState::Unsubscribed,
            session: None,
            messages: Vec::new(),
            input: String::new(),
            selected: None,
            emoji_picker_open: false,
            viewport_rows: DEFAULT_VIEWPORT_ROWS,
            scroll_offset: 0,
            events_tx: None,
            events: None,
            subscriptions: Vec::new(),
        }
    }

    /// Creates the controller and subscribes right away.
    pub fn mount(provider: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        let mut feed = Self::new(provider, store);
        feed.subscribe();
        feed
    }

    /// Opens the message query and the session subscription.
    pub fn subscribe(&mut self) {
        if self.state == FeedState::Subscribed {
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();

        let query = Query::new(MESSAGES_COLLECTION).order_by("createdAt", Direction::Ascending);
        let snapshots = tx.clone();
        let messages = self.store.subscribe_collection(
            query,
            Arc::new(move |snapshot: QuerySnapshot| {
                let _ = snapshots.send(FeedEvent::Snapshot(snapshot));
            }),
        );

        let sessions = tx.clone();
        let session = self
            .provider
            .subscribe_session_changes(Arc::new(move |session: Option<Session>| {
                let _ = sessions.send(FeedEvent::Session(session));
            }));

        self.subscriptions = vec![messages, session];
        self.events_tx = Some(tx);
        self.events = Some(rx);
        self.state = FeedState::Subscribed;
        tracing::debug!("live feed subscribed");
        self.apply_pending();
    }

    /// Releases both subscriptions. Notifications arriving afterwards are dropped.
    pub fn teardown(&mut self) {
        if self.state == FeedState::Unsubscribed {
            return;
        }
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        self.events_tx = None;
        if let Some(mut events) = self.events.take() {
            events.close();
        }
        self.state = FeedState::Unsubscribed;
        tracing::debug!("live feed torn down");
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Waits for the next notification and applies it.
    ///
    /// Returns `false` right away when the controller is not subscribed.
    pub async fn next_event(&mut self) -> bool {
        let Some(events) = self.events.as_mut() else {
            return false;
        };
        match events.recv().await {
            Some(event) => {
                self.apply(event);
                true
            }
            None => false,
        }
    }

    /// Applies every queued notification. Returns `true` if any was applied.
    pub fn apply_pending(&mut self) -> bool {
        let mut applied = false;
        while let Some(event) = self.events.as_mut().and_then(|rx| rx.try_recv().ok()) {
            self.apply(event);
            applied = true;
        }
        applied
    }

    fn apply(&mut self, event: FeedEvent) {
        if self.state != FeedState::Subscribed {
            return;
        }
        match event {
            FeedEvent::Session(session) => self.session = session,
            FeedEvent::Snapshot(snapshot) => {
                self.messages = Message::from_query(&snapshot);
                if let Some(id) = &self.selected {
                    if !self.messages.iter().any(|m| &m.id == id) {
                        self.selected = None;
                    }
                }
                self.scroll_to_bottom();
            }
            FeedEvent::Deleted => self.selected = None,
        }
    }

    /// The rendered list, top to bottom.
    pub fn rows(&self) -> Vec<MessageRow<'_>> {
        let me = self.session.as_ref().map(|s| s.uid.as_str());
        self.messages
            .iter()
            .enumerate()
            .map(|(i, message)| {
                let is_me = me == Some(message.sender_uid.as_str());
                let selected = self.selected.as_deref() == Some(message.id.as_str());
                MessageRow {
                    message,
                    is_me,
                    starts_run: starts_run(&self.messages, i),
                    selected,
                    can_delete: is_me && selected,
                    label: if is_me { "You" } else { message.sender_name.as_str() },
                    avatar_color: avatar_color(&message.sender_uid),
                    avatar_initial: avatar_initial(&message.sender_name),
                }
            })
            .collect()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Sends the input buffer.
    pub fn send_input(&mut self) -> Option<JoinHandle<()>> {
        let text = self.input.clone();
        self.send(&text)
    }

    /// Issues a create for `text` from the current session.
    ///
    /// Nothing is sent without a session or when `text` is blank. Otherwise the
    /// input, the selection and the emoji picker are reset immediately and the
    /// write runs in the background.
    pub fn send(&mut self, text: &str) -> Option<JoinHandle<()>> {
        let text = text.trim();
        let session = self.session.as_ref()?;
        if text.is_empty() {
            return None;
        }

        let fields = Message::outgoing(text, session);
        self.input.clear();
        self.selected = None;
        self.emoji_picker_open = false;

        let store = Arc::clone(&self.store);
        spawn_detached("send message", async move {
            match store.create(MESSAGES_COLLECTION, fields).await {
                Ok(id) => tracing::debug!(%id, "message sent"),
                Err(e) => tracing::error!(error = %e, "send message failed"),
            }
        })
    }

    /// Issues a delete of `message_id` in the background.
    pub fn delete(&mut self, message_id: &str) -> Option<JoinHandle<()>> {
        let store = Arc::clone(&self.store);
        let events = self.events_tx.clone();
        let id = message_id.to_string();
        spawn_detached("delete message", async move {
            match store.delete(MESSAGES_COLLECTION, &id).await {
                Ok(()) => {
                    tracing::debug!(%id, "message deleted");
                    if let Some(events) = events {
                        let _ = events.send(FeedEvent::Deleted);
                    }
                }
                Err(e) => tracing::error!(%id, error = %e, "delete message failed"),
            }
        })
    }

    /// Deletes the selected message if the delete control is showing for it.
    pub fn delete_selected(&mut self) -> Option<JoinHandle<()>> {
        let id = self
            .rows()
            .into_iter()
            .find(|row| row.can_delete)
            .map(|row| row.message.id.clone())?;
        self.delete(&id)
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Toggles selection of one of our own messages; others are ignored.
    pub fn toggle_select(&mut self, message_id: &str) {
        let Some(me) = self.session.as_ref().map(|s| s.uid.as_str()) else {
            return;
        };
        let own = self
            .messages
            .iter()
            .any(|m| m.id == message_id && m.sender_uid == me);
        if !own {
            return;
        }

        if self.selected.as_deref() == Some(message_id) {
            self.selected = None;
        } else {
            self.selected = Some(message_id.to_string());
        }
    }

    pub fn emoji_picker_open(&self) -> bool {
        self.emoji_picker_open
    }

    pub fn toggle_emoji_picker(&mut self) {
        self.emoji_picker_open = !self.emoji_picker_open;
    }

    /// Appends `emoji` to the input buffer.
    pub fn pick_emoji(&mut self, emoji: &str) {
        self.input.push_str(emoji);
    }

    pub fn viewport_rows(&self) -> usize {
        self.viewport_rows
    }

    pub fn set_viewport_rows(&mut self, rows: usize) {
        self.viewport_rows = rows.max(1);
        self.scroll_to_bottom();
    }

    /// Index of the first visible row.
    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn max_scroll_offset(&self) -> usize {
        self.messages.len().saturating_sub(self.viewport_rows)
    }

    fn scroll_to_bottom(&mut self) {
        self.scroll_offset = self.max_scroll_offset();
    }

    /// Signs out in the background; the session gate reacts to the change.
    pub fn sign_out(&self) -> Option<JoinHandle<()>> {
        let provider = Arc::clone(&self.provider);
        spawn_detached("sign out", async move {
            if let Err(e) = provider.sign_out().await {
                tracing::error!(error = %e, "sign out failed");
            }
        })
    }
}

impl Drop for LiveFeedController {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Whether `messages[index]` starts a run of messages from one sender.
pub fn starts_run(messages: &[Message], index: usize) -> bool {
    let Some(current) = messages.get(index) else {
        return false;
    };
    match index.checked_sub(1).and_then(|prev| messages.get(prev)) {
        Some(prev) => prev.sender_uid != current.sender_uid,
        None => true,
    }
}
