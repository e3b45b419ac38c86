//! Client-side view of a listen target.
//!
//! The listen protocol sends per-document changes and marks consistent points
//! with target changes. [`WatchState`] folds those into a document map and
//! hands out an ordered [`QuerySnapshot`] at each consistent point where the
//! view changed.

use super::models::{
    Direction, Document, ListenResponse, Order, TargetChange, TargetChangeType, Value, ValueType,
};
use super::snapshot::{field_value, DocumentSnapshot, QuerySnapshot};
use super::FirestoreError;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;

pub(crate) struct WatchState {
    target_id: i32,
    orders: Vec<Order>,
    documents: HashMap<String, Document>,
    current: bool,
    changed: bool,
    emitted: bool,
}

impl WatchState {
    pub(crate) fn new(target_id: i32, orders: Vec<Order>) -> Self {
        Self {
            target_id,
            orders,
            documents: HashMap::new(),
            current: false,
            changed: false,
            emitted: false,
        }
    }

    /// Applies one response. Returns a snapshot when a consistent, changed view is reached.
    pub(crate) fn apply(
        &mut self,
        response: ListenResponse,
    ) -> Result<Option<QuerySnapshot>, FirestoreError> {
        if let Some(change) = response.document_change {
            if change.target_ids.contains(&self.target_id) {
                let document = change.document;
                self.documents.insert(document.name.clone(), document);
                self.changed = true;
            } else if change.removed_target_ids.contains(&self.target_id) {
                self.changed |= self.documents.remove(&change.document.name).is_some();
            }
        }

        if let Some(delete) = response.document_delete {
            self.changed |= self.documents.remove(&delete.document).is_some();
        }

        if let Some(remove) = response.document_remove {
            self.changed |= self.documents.remove(&remove.document).is_some();
        }

        if let Some(filter) = response.filter {
            if filter.target_id == self.target_id && filter.count as usize != self.documents.len() {
                tracing::warn!(
                    expected = filter.count,
                    local = self.documents.len(),
                    "existence filter mismatch, resetting view"
                );
                self.reset();
            }
        }

        match response.target_change {
            Some(change) => self.apply_target_change(change),
            None => Ok(None),
        }
    }

    fn apply_target_change(
        &mut self,
        change: TargetChange,
    ) -> Result<Option<QuerySnapshot>, FirestoreError> {
        let ours = change.target_ids.is_empty() || change.target_ids.contains(&self.target_id);
        if !ours {
            return Ok(None);
        }

        match change.target_change_type {
            TargetChangeType::Add => Ok(None),
            TargetChangeType::Remove => {
                let reason = change
                    .cause
                    .and_then(|c| c.message)
                    .unwrap_or_else(|| "target removed by server".to_string());
                Err(FirestoreError::ListenError(reason))
            }
            TargetChangeType::Reset => {
                self.reset();
                Ok(None)
            }
            TargetChangeType::Current => {
                self.current = true;
                Ok(self.take_snapshot(change.read_time))
            }
            TargetChangeType::NoChange => {
                // Only a global NO_CHANGE marks a consistent point.
                if change.target_ids.is_empty() {
                    Ok(self.take_snapshot(change.read_time))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Drops the local view; nothing is emitted until the server marks CURRENT again.
    fn reset(&mut self) {
        self.documents.clear();
        self.current = false;
        self.changed = true;
    }

    fn take_snapshot(&mut self, read_time: Option<String>) -> Option<QuerySnapshot> {
        if !self.current || (self.emitted && !self.changed) {
            return None;
        }
        self.changed = false;
        self.emitted = true;
        Some(self.snapshot(read_time))
    }

    pub(crate) fn snapshot(&self, read_time: Option<String>) -> QuerySnapshot {
        let mut documents: Vec<&Document> = self.documents.values().collect();
        documents.sort_by(|a, b| self.compare_documents(a, b));

        let documents = documents
            .into_iter()
            .map(|d| DocumentSnapshot::from_document(d.clone(), read_time.clone()))
            .collect();

        QuerySnapshot::new(documents, read_time)
    }

    fn compare_documents(&self, a: &Document, b: &Document) -> Ordering {
        for order in &self.orders {
            let path = &order.field.field_path;
            let ordering = compare_optional(field_value(a, path), field_value(b, path));
            let ordering = match order.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.name.cmp(&b.name)
    }
}

fn compare_optional(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_values(a, b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Position of a value's type in Firestore's cross-type ordering.
fn type_rank(value: &ValueType) -> u8 {
    match value {
        ValueType::NullValue(_) => 0,
        ValueType::BooleanValue(_) => 1,
        ValueType::IntegerValue(_) | ValueType::DoubleValue(_) => 2,
        ValueType::TimestampValue(_) => 3,
        ValueType::StringValue(_) => 4,
        ValueType::BytesValue(_) => 5,
        ValueType::ReferenceValue(_) => 6,
        ValueType::GeoPointValue(_) => 7,
        ValueType::ArrayValue(_) => 8,
        ValueType::MapValue(_) => 9,
    }
}

pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    use ValueType::*;

    let (a, b) = (&a.value_type, &b.value_type);
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (BooleanValue(x), BooleanValue(y)) => x.cmp(y),
        (IntegerValue(x), IntegerValue(y)) => match (x.parse::<i64>(), y.parse::<i64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => x.cmp(y),
        },
        (IntegerValue(_), DoubleValue(_))
        | (DoubleValue(_), IntegerValue(_))
        | (DoubleValue(_), DoubleValue(_)) => number(a).total_cmp(&number(b)),
        (TimestampValue(x), TimestampValue(y)) => {
            match (x.parse::<DateTime<Utc>>(), y.parse::<DateTime<Utc>>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (StringValue(x), StringValue(y))
        | (BytesValue(x), BytesValue(y))
        | (ReferenceValue(x), ReferenceValue(y)) => x.cmp(y),
        (GeoPointValue(x), GeoPointValue(y)) => x
            .latitude
            .total_cmp(&y.latitude)
            .then(x.longitude.total_cmp(&y.longitude)),
        (ArrayValue(x), ArrayValue(y)) => x
            .values
            .iter()
            .zip(&y.values)
            .map(|(x, y)| compare_values(x, y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.values.len().cmp(&y.values.len())),
        _ => Ordering::Equal,
    }
}

fn number(value: &ValueType) -> f64 {
    match value {
        ValueType::IntegerValue(s) => s.parse::<i64>().map(|i| i as f64).unwrap_or(f64::NAN),
        ValueType::DoubleValue(d) => *d,
        _ => f64::NAN,
    }
}
