use crate::auth::session::Session;
use crate::firestore::fields::WriteFields;
use crate::firestore::snapshot::{DocumentSnapshot, QuerySnapshot};
use crate::firestore::FirestoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One chat message as stored in the `messages` collection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(skip)]
    pub id: String,
    pub text: String,
    pub sender_uid: String,
    #[serde(default)]
    pub sender_name: String,
    /// Assigned by the store when the message is written.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Result<Option<Self>, FirestoreError> {
        Ok(snapshot.data::<Message>()?.map(|message| Message {
            id: snapshot.id().to_string(),
            ..message
        }))
    }

    /// Decodes a query result, skipping documents that are not messages.
    pub fn from_query(snapshot: &QuerySnapshot) -> Vec<Message> {
        snapshot
            .iter()
            .filter_map(|doc| match Message::from_snapshot(doc) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(id = doc.id(), error = %e, "skipping undecodable message");
                    None
                }
            })
            .collect()
    }

    /// The write for a new message from `session`; `createdAt` is left to the server.
    pub fn outgoing(text: &str, session: &Session) -> WriteFields {
        WriteFields::new()
            .with("text", text)
            .with("senderUid", session.uid.as_str())
            .with("senderName", session.sender_name())
            .with_server_timestamp("createdAt")
    }
}

/// The document kept for every account at `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub is_online: bool,
    /// Written as a timestamp value, not through serde.
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// The profile written when an account is created.
    pub fn for_new_account(session: &Session, now: DateTime<Utc>) -> Self {
        Self {
            uid: session.uid.clone(),
            email: session.email.clone(),
            name: default_name(&session.email).to_string(),
            photo_url: String::new(),
            is_online: true,
            created_at: now,
        }
    }

    pub fn into_fields(self) -> Result<WriteFields, FirestoreError> {
        Ok(WriteFields::from_serializable(&self)?.with_timestamp("createdAt", self.created_at))
    }

    /// The merge write applied on every sign-in.
    pub fn online() -> WriteFields {
        WriteFields::new().with("isOnline", true)
    }
}

/// The part of an email before the first `@`.
pub fn default_name(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}
