//! Cloud Firestore module.
//!
//! This module provides the document operations the chat needs (create with a
//! server timestamp, merge/replace upsert, delete) and live collection queries.
//!
//! # Real-time Updates
//!
//! [`DocumentStore::subscribe_collection`] opens a listen stream for a query on
//! a background task and calls back with the full, ordered result set every
//! time it changes, until the returned [`Subscription`] is released.

pub mod fields;
pub mod listen;
pub mod models;
pub mod query;
pub mod reference;
pub mod snapshot;
pub(crate) mod watch;


use self::fields::WriteFields;
use self::query::{ExecutableQuery, Query, LISTEN_TARGET_ID};
use self::reference::{CollectionReference, DocumentReference, Location};
use self::snapshot::QuerySnapshot;
use self::watch::WatchState;
use crate::auth::session::SessionState;
use crate::config::FirebaseConfig;
use crate::core::build_client;
use crate::core::middleware::SessionTokenMiddleware;
use crate::core::subscription::{Callback, Subscription};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_middleware::ClientWithMiddleware;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during Firestore operations.
#[derive(Error, Debug)]
pub enum FirestoreError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Firestore API.
    #[error("API error: {0}")]
    ApiError(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    /// A listen stream broke or the server dropped its target.
    #[error("Listen error: {0}")]
    ListenError(String),
}

/// The document database as the chat components see it.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Delivers the full ordered result set of `query` on every change.
    fn subscribe_collection(&self, query: Query, callback: Callback<QuerySnapshot>)
        -> Subscription;

    /// Adds a document under a generated id and returns the id.
    async fn create(&self, collection: &str, fields: WriteFields) -> Result<String, FirestoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), FirestoreError>;

    /// Writes a document; with `merge` only the given fields are touched.
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        fields: WriteFields,
        merge: bool,
    ) -> Result<(), FirestoreError>;
}

/// Client for interacting with Cloud Firestore.
#[derive(Clone)]
pub struct FirebaseFirestore {
    client: ClientWithMiddleware,
    api_root: String,
    database: String,
}

impl FirebaseFirestore {
    /// Creates a client that authenticates as whoever holds `session`.
    pub fn new(config: &FirebaseConfig, session: SessionState) -> Self {
        let client = build_client(Some(SessionTokenMiddleware::new(session)), config.max_retries);
        Self::new_with_client(client, config.firestore_url(), config.database_name())
    }

    /// Creates a client over a prepared HTTP client (useful for testing).
    ///
    /// `api_root` is the REST root such as `https://firestore.googleapis.com/v1`
    /// and `database` the resource name `projects/{p}/databases/{d}`.
    pub fn new_with_client(client: ClientWithMiddleware, api_root: String, database: String) -> Self {
        Self {
            client,
            api_root,
            database,
        }
    }

    fn location(&self) -> Location {
        Location {
            documents_url: format!("{}/{}/documents", self.api_root, self.database),
            documents_name: format!("{}/documents", self.database),
        }
    }

    /// Gets a `CollectionReference` for a top-level collection (e.g. "messages").
    pub fn collection(&self, collection_id: &str) -> CollectionReference {
        CollectionReference {
            client: self.client.clone(),
            location: self.location(),
            path: collection_id.to_string(),
        }
    }

    /// Gets a `DocumentReference` for a slash-separated path (e.g. "users/uid").
    pub fn doc(&self, document_path: &str) -> DocumentReference {
        DocumentReference {
            client: self.client.clone(),
            location: self.location(),
            path: document_path.to_string(),
        }
    }

    /// Attaches a query definition to this client.
    pub fn query(&self, query: Query) -> ExecutableQuery {
        ExecutableQuery {
            client: self.client.clone(),
            database_url: format!("{}/{}", self.api_root, self.database),
            database_name: self.database.clone(),
            query,
        }
    }
}

#[async_trait]
impl DocumentStore for FirebaseFirestore {
    fn subscribe_collection(
        &self,
        query: Query,
        callback: Callback<QuerySnapshot>,
    ) -> Subscription {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "live queries need a tokio runtime");
                return Subscription::noop();
            }
        };

        let cancelled = Arc::new(AtomicBool::new(false));
        let task = runtime.spawn(run_listen(
            self.query(query),
            callback,
            Arc::clone(&cancelled),
        ));

        Subscription::new(move || {
            cancelled.store(true, Ordering::SeqCst);
            task.abort();
        })
    }

    async fn create(&self, collection: &str, fields: WriteFields) -> Result<String, FirestoreError> {
        self.collection(collection).add(fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), FirestoreError> {
        self.collection(collection).doc(id).delete().await
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        fields: WriteFields,
        merge: bool,
    ) -> Result<(), FirestoreError> {
        self.collection(collection).doc(id).set(fields, merge).await
    }
}

/// Drives one listen stream until it ends, fails, or is cancelled.
async fn run_listen(
    query: ExecutableQuery,
    callback: Callback<QuerySnapshot>,
    cancelled: Arc<AtomicBool>,
) {
    let collection = query.query().collection_id().to_string();

    let mut stream = match query.listen().await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(%collection, error = %e, "could not open live query");
            return;
        }
    };

    let mut watch = WatchState::new(LISTEN_TARGET_ID, query.query().orders().to_vec());

    while let Some(item) = stream.next().await {
        let response = match item {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%collection, error = %e, "live query stream failed");
                return;
            }
        };

        match watch.apply(response) {
            Ok(Some(snapshot)) => {
                if cancelled.load(Ordering::SeqCst) {
                    return;
                }
                tracing::debug!(%collection, documents = snapshot.size(), "snapshot");
                callback(snapshot);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(%collection, error = %e, "live query closed by server");
                return;
            }
        }
    }

    tracing::debug!(%collection, "live query stream ended");
}
