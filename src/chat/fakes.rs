//! In-memory identity provider and document store for the component tests.

use crate::auth::session::{Session, SessionState};
use crate::auth::{provider_error, AuthError, IdentityProvider};
use crate::chat::models::default_name;
use crate::core::subscription::{Callback, Listeners, Subscription};
use crate::firestore::fields::WriteFields;
use crate::firestore::models::{Document, Value};
use crate::firestore::query::Query;
use crate::firestore::snapshot::{DocumentSnapshot, QuerySnapshot};
use crate::firestore::{DocumentStore, FirestoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) fn session(uid: &str, email: &str) -> Session {
    Session {
        uid: uid.to_string(),
        email: email.to_string(),
        display_name: None,
        id_token: format!("token-{uid}"),
        refresh_token: String::new(),
        expires_in: Some(3600),
    }
}

#[derive(Default)]
pub(crate) struct FakeIdentity {
    pub(crate) state: SessionState,
    fail_with: Mutex<Option<String>>,
}

impl FakeIdentity {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn signed_in(uid: &str, email: &str) -> Self {
        let identity = Self::default();
        identity.state.set(Some(session(uid, email)));
        identity
    }

    /// Makes the next create/authenticate fail with an Identity Toolkit code.
    pub(crate) fn fail_next(&self, code: &str) {
        *self.fail_with.lock().unwrap() = Some(code.to_string());
    }

    fn issue(&self, email: &str) -> Result<Session, AuthError> {
        if let Some(code) = self.fail_with.lock().unwrap().take() {
            return Err(provider_error(&code));
        }
        let session = session(&format!("uid-{}", default_name(email)), email);
        self.state.set(Some(session.clone()));
        Ok(session)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn create_account(&self, email: &str, _password: &str) -> Result<Session, AuthError> {
        self.issue(email)
    }

    async fn authenticate(&self, email: &str, _password: &str) -> Result<Session, AuthError> {
        self.issue(email)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.state.set(None);
        Ok(())
    }

    fn subscribe_session_changes(&self, callback: Callback<Option<Session>>) -> Subscription {
        self.state.subscribe(callback)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StoreCall {
    Create {
        collection: String,
        fields: WriteFields,
    },
    Delete {
        collection: String,
        id: String,
    },
    Upsert {
        collection: String,
        id: String,
        fields: WriteFields,
        merge: bool,
    },
}

#[derive(Default)]
pub(crate) struct FakeStore {
    calls: Mutex<Vec<StoreCall>>,
    documents: Mutex<HashMap<String, HashMap<String, Value>>>,
    listeners: Listeners<QuerySnapshot>,
    fail_deletes: AtomicBool,
    fail_upserts: AtomicBool,
    next_id: AtomicUsize,
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn document(&self, path: &str) -> Option<HashMap<String, Value>> {
        self.documents.lock().unwrap().get(path).cloned()
    }

    pub(crate) fn seed(&self, path: &str, fields: WriteFields) {
        let (fields, _) = fields.into_parts();
        self.documents.lock().unwrap().insert(path.to_string(), fields);
    }

    pub(crate) fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_upserts(&self) {
        self.fail_upserts.store(true, Ordering::SeqCst);
    }

    pub(crate) fn subscribers(&self) -> usize {
        self.listeners.len()
    }

    /// Delivers a result set of `(id, sender uid, sender name, text)` rows.
    pub(crate) fn push(&self, rows: &[(&str, &str, &str, &str)]) {
        self.listeners.emit(messages(rows));
    }
}

pub(crate) fn messages(rows: &[(&str, &str, &str, &str)]) -> QuerySnapshot {
    let documents = rows
        .iter()
        .map(|(id, uid, name, text)| {
            let (fields, _) = WriteFields::new()
                .with("text", *text)
                .with("senderUid", *uid)
                .with("senderName", *name)
                .into_parts();
            DocumentSnapshot::from_document(
                Document {
                    name: format!("projects/p/databases/(default)/documents/messages/{id}"),
                    fields,
                    create_time: String::new(),
                    update_time: String::new(),
                },
                None,
            )
        })
        .collect();
    QuerySnapshot::new(documents, None)
}

#[async_trait]
impl DocumentStore for FakeStore {
    fn subscribe_collection(
        &self,
        _query: Query,
        callback: Callback<QuerySnapshot>,
    ) -> Subscription {
        self.listeners.add(callback)
    }

    async fn create(&self, collection: &str, fields: WriteFields) -> Result<String, FirestoreError> {
        let id = format!("auto{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.calls.lock().unwrap().push(StoreCall::Create {
            collection: collection.to_string(),
            fields: fields.clone(),
        });
        let (fields, _) = fields.into_parts();
        self.documents
            .lock()
            .unwrap()
            .insert(format!("{collection}/{id}"), fields);
        Ok(id)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), FirestoreError> {
        self.calls.lock().unwrap().push(StoreCall::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(FirestoreError::ApiError(
                "Missing or insufficient permissions.".to_string(),
            ));
        }
        self.documents
            .lock()
            .unwrap()
            .remove(&format!("{collection}/{id}"));
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        fields: WriteFields,
        merge: bool,
    ) -> Result<(), FirestoreError> {
        self.calls.lock().unwrap().push(StoreCall::Upsert {
            collection: collection.to_string(),
            id: id.to_string(),
            fields: fields.clone(),
            merge,
        });
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(FirestoreError::ApiError("The service is currently unavailable.".to_string()));
        }
        let (fields, _) = fields.into_parts();
        let mut documents = self.documents.lock().unwrap();
        let document = documents.entry(format!("{collection}/{id}")).or_default();
        if !merge {
            document.clear();
        }
        document.extend(fields);
        Ok(())
    }
}
