use super::fields::{quote_field_path, WriteFields};
use super::models::{
    CommitRequest, CommitResponse, Document, DocumentMask, FieldTransform, Precondition,
    ServerValue, Write,
};
use super::FirestoreError;
use crate::core::parse_error_response;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;

const AUTO_ID_LENGTH: usize = 20;

/// A 20 character alphanumeric id, the same shape the Firebase SDKs generate.
pub(crate) fn auto_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Where a reference lives: the REST URL for requests and the resource name for commits.
#[derive(Clone, Debug)]
pub(crate) struct Location {
    pub(crate) documents_url: String,
    pub(crate) documents_name: String,
}

impl Location {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.documents_url, path)
    }

    fn name(&self, path: &str) -> String {
        format!("{}/{}", self.documents_name, path)
    }

    fn commit_url(&self) -> String {
        format!("{}:commit", self.documents_url)
    }
}

#[derive(Clone)]
pub struct DocumentReference {
    pub(crate) client: ClientWithMiddleware,
    pub(crate) location: Location,
    pub(crate) path: String,
}

impl DocumentReference {
    /// Writes `fields`, replacing the document or, with `merge`, only the named fields.
    ///
    /// Either way the document is created when missing.
    pub async fn set(&self, fields: WriteFields, merge: bool) -> Result<(), FirestoreError> {
        if !fields.server_timestamps().is_empty() {
            let mask = merge.then(|| fields.field_paths());
            return self.commit_update(fields, mask, None).await;
        }

        let mask: Vec<(&str, String)> = if merge {
            fields
                .field_paths()
                .into_iter()
                .map(|path| ("updateMask.fieldPaths", path))
                .collect()
        } else {
            Vec::new()
        };

        let (fields, _) = fields.into_parts();
        let body = serde_json::to_vec(&serde_json::json!({ "fields": fields }))?;

        let response = self
            .client
            .patch(self.location.url(&self.path))
            .query(&mask)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Set document failed").await,
            ));
        }

        Ok(())
    }

    /// Creates the document, failing if it already exists.
    pub async fn create(&self, fields: WriteFields) -> Result<(), FirestoreError> {
        let precondition = Precondition {
            exists: Some(false),
        };
        self.commit_update(fields, None, Some(precondition)).await
    }

    pub async fn delete(&self) -> Result<(), FirestoreError> {
        let response = self
            .client
            .delete(self.location.url(&self.path))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Delete document failed").await,
            ));
        }

        Ok(())
    }

    async fn commit_update(
        &self,
        fields: WriteFields,
        update_mask: Option<Vec<String>>,
        current_document: Option<Precondition>,
    ) -> Result<(), FirestoreError> {
        let (fields, server_timestamps) = fields.into_parts();
        let transform_paths: Vec<String> =
            server_timestamps.iter().map(|f| quote_field_path(f)).collect();

        // Transformed fields are applied after the mask, so they must not appear in it.
        let update_mask = update_mask.map(|paths| DocumentMask {
            field_paths: paths
                .into_iter()
                .filter(|p| !transform_paths.contains(p))
                .collect(),
        });

        let update_transforms = (!transform_paths.is_empty()).then(|| {
            transform_paths
                .into_iter()
                .map(|field_path| FieldTransform {
                    field_path,
                    set_to_server_value: ServerValue::RequestTime,
                })
                .collect()
        });

        let request = CommitRequest {
            writes: vec![Write {
                update: Document {
                    name: self.location.name(&self.path),
                    fields,
                    create_time: String::new(),
                    update_time: String::new(),
                },
                update_mask,
                update_transforms,
                current_document,
            }],
        };

        let response = self
            .client
            .post(self.location.commit_url())
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Commit failed").await,
            ));
        }

        let result: CommitResponse = response.json().await?;
        tracing::debug!(
            path = %self.path,
            commit_time = ?result.commit_time,
            "document committed"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct CollectionReference {
    pub(crate) client: ClientWithMiddleware,
    pub(crate) location: Location,
    pub(crate) path: String,
}

impl CollectionReference {
    pub fn doc(&self, document_id: &str) -> DocumentReference {
        DocumentReference {
            client: self.client.clone(),
            location: self.location.clone(),
            path: format!("{}/{}", self.path, document_id),
        }
    }

    /// Adds a document under a fresh auto id and returns that id.
    pub async fn add(&self, fields: WriteFields) -> Result<String, FirestoreError> {
        let id = auto_id();
        self.doc(&id).create(fields).await?;
        Ok(id)
    }
}
