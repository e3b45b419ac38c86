use super::listen::{listen_request, ListenStream};
use super::models::{
    CollectionSelector, Direction, FieldReference, ListenRequest, Order, QueryTarget,
    StructuredQuery, Target, TargetType,
};
use super::FirestoreError;
use reqwest_middleware::ClientWithMiddleware;

/// Target id used for the single target each listen stream carries.
pub(crate) const LISTEN_TARGET_ID: i32 = 1;

/// A definition of a Firestore query: a collection and its sort order.
///
/// The query is independent of any client, so it can be built up front and
/// handed to whichever store executes it.
#[derive(Clone, Debug)]
pub struct Query {
    pub(crate) collection_id: String,
    pub(crate) query: StructuredQuery,
}

impl Query {
    /// Creates a new `Query` targeting the specified collection.
    pub fn new(collection_id: impl Into<String>) -> Self {
        let collection_id = collection_id.into();
        Self {
            collection_id: collection_id.clone(),
            query: StructuredQuery {
                from: vec![CollectionSelector {
                    collection_id,
                    all_descendants: None,
                }],
                order_by: None,
            },
        }
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    /// Sorts the query results by the specified field.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        let order = Order {
            field: FieldReference {
                field_path: field.to_string(),
            },
            direction,
        };

        self.query.order_by.get_or_insert_with(Vec::new).push(order);
        self
    }

    /// The sort orders, outermost first.
    pub fn orders(&self) -> &[Order] {
        self.query.order_by.as_deref().unwrap_or_default()
    }
}

/// A `Query` attached to a Firestore client, ready for execution.
#[derive(Clone)]
pub struct ExecutableQuery {
    pub(crate) client: ClientWithMiddleware,
    pub(crate) database_url: String,
    pub(crate) database_name: String,
    pub(crate) query: Query,
}

impl ExecutableQuery {
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Opens a listen stream for the query results.
    pub async fn listen(&self) -> Result<ListenStream, FirestoreError> {
        let target = Target {
            target_type: TargetType::Query(QueryTarget {
                parent: format!("{}/documents", self.database_name),
                structured_query: self.query.query.clone(),
            }),
            target_id: LISTEN_TARGET_ID,
            resume_token: None,
        };

        let request = ListenRequest {
            database: self.database_name.clone(),
            add_target: Some(target),
            remove_target: None,
        };

        tracing::debug!(collection = %self.query.collection_id, "opening listen stream");
        listen_request(&self.client, &self.database_url, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_by_serializes_as_structured_query() {
        let query = Query::new("messages").order_by("createdAt", Direction::Ascending);
        let json = serde_json::to_value(&query.query).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "from": [{ "collectionId": "messages" }],
                "orderBy": [{ "field": { "fieldPath": "createdAt" }, "direction": "ASCENDING" }]
            })
        );
        assert_eq!(query.orders().len(), 1);
    }

    #[test]
    fn unordered_query_has_no_orders() {
        let query = Query::new("messages");
        assert!(query.orders().is_empty());
        assert_eq!(query.collection_id(), "messages");
    }
}
