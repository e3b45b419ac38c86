use super::models::{Document, Value, ValueType};
use super::FirestoreError;
use serde::de::{DeserializeOwned, Error as _};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

/// A snapshot of a document in Firestore.
///
/// It contains data read from a document in your Firestore database.
/// The data can be extracted with `.data()`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub(crate) id: String,
    pub(crate) document: Option<Document>,
    pub(crate) read_time: Option<String>,
}

impl DocumentSnapshot {
    pub fn from_document(document: Document, read_time: Option<String>) -> Self {
        Self {
            id: document.id().to_string(),
            document: Some(document),
            read_time,
        }
    }

    /// The ID of the document.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The time this snapshot was read.
    pub fn read_time(&self) -> Option<&str> {
        self.read_time.as_deref()
    }

    /// Decodes the document's fields into `T`.
    ///
    /// Returns `Ok(None)` if the document does not exist.
    pub fn data<T: DeserializeOwned>(&self) -> Result<Option<T>, FirestoreError> {
        match &self.document {
            Some(doc) => Ok(Some(serde_json::from_value(fields_to_json(&doc.fields)?)?)),
            None => Ok(None),
        }
    }
}

fn fields_to_json(fields: &HashMap<String, Value>) -> Result<JsonValue, FirestoreError> {
    let mut object = Map::with_capacity(fields.len());
    for (name, value) in fields {
        object.insert(name.clone(), value_to_json(value)?);
    }
    Ok(JsonValue::Object(object))
}

/// Timestamps, bytes and references decode as their string forms.
fn value_to_json(value: &Value) -> Result<JsonValue, FirestoreError> {
    Ok(match &value.value_type {
        ValueType::NullValue(()) => JsonValue::Null,
        ValueType::BooleanValue(b) => JsonValue::Bool(*b),
        ValueType::IntegerValue(digits) => {
            let i: i64 = digits.parse().map_err(|_| {
                serde_json::Error::custom(format!("integer value {digits:?} is out of range"))
            })?;
            JsonValue::from(i)
        }
        ValueType::DoubleValue(d) => serde_json::Number::from_f64(*d)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ValueType::StringValue(s)
        | ValueType::TimestampValue(s)
        | ValueType::BytesValue(s)
        | ValueType::ReferenceValue(s) => JsonValue::String(s.clone()),
        ValueType::GeoPointValue(point) => serde_json::json!({
            "latitude": point.latitude,
            "longitude": point.longitude,
        }),
        ValueType::ArrayValue(array) => JsonValue::Array(
            array
                .values
                .iter()
                .map(value_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        ValueType::MapValue(map) => fields_to_json(&map.fields)?,
    })
}

/// Looks up a dotted field path, descending through map values.
pub(crate) fn field_value<'d>(document: &'d Document, path: &str) -> Option<&'d Value> {
    let mut segments = path.split('.');
    let mut current = document.fields.get(segments.next()?)?;
    for segment in segments {
        match &current.value_type {
            ValueType::MapValue(map) => current = map.fields.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

/// A `QuerySnapshot` contains zero or more `DocumentSnapshot` objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    pub(crate) documents: Vec<DocumentSnapshot>,
    pub(crate) read_time: Option<String>,
}

impl QuerySnapshot {
    pub fn new(documents: Vec<DocumentSnapshot>, read_time: Option<String>) -> Self {
        Self {
            documents,
            read_time,
        }
    }

    /// The documents in this snapshot.
    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    /// Returns `true` if there are no documents in the snapshot.
    pub fn empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// The number of documents in the snapshot.
    pub fn size(&self) -> usize {
        self.documents.len()
    }

    /// The time this snapshot was read.
    pub fn read_time(&self) -> Option<&str> {
        self.read_time.as_deref()
    }

    /// Iterates over the document snapshots.
    pub fn iter(&self) -> std::slice::Iter<'_, DocumentSnapshot> {
        self.documents.iter()
    }
}

impl<'a> IntoIterator for &'a QuerySnapshot {
    type Item = &'a DocumentSnapshot;
    type IntoIter = std::slice::Iter<'a, DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::models::MapValue;
    use std::collections::HashMap;

    fn document() -> Document {
        let mut address = HashMap::new();
        address.insert("city".to_string(), Value::from("Lisbon"));
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), Value::from("Ana"));
        fields.insert(
            "address".to_string(),
            Value::from(ValueType::MapValue(MapValue { fields: address })),
        );
        Document {
            name: "projects/p/databases/(default)/documents/users/ana".into(),
            fields,
            create_time: "2024-01-01T00:00:00Z".into(),
            update_time: "2024-01-02T00:00:00Z".into(),
        }
    }

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Address {
        city: String,
    }

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct User {
        name: String,
        address: Address,
    }

    #[test]
    fn id_is_last_name_segment() {
        let snapshot = DocumentSnapshot::from_document(document(), None);
        assert_eq!(snapshot.id(), "ana");
    }

    #[test]
    fn data_decodes_nested_maps() {
        let snapshot = DocumentSnapshot::from_document(document(), None);
        let user: User = snapshot.data().unwrap().unwrap();
        assert_eq!(user.name, "Ana");
        assert_eq!(user.address.city, "Lisbon");
    }

    #[test]
    fn field_value_follows_dotted_paths() {
        let document = document();
        assert_eq!(field_value(&document, "address.city"), Some(&Value::from("Lisbon")));
        assert_eq!(field_value(&document, "name.first"), None);
        assert_eq!(field_value(&document, "missing"), None);
    }

    #[test]
    fn oversized_integers_fail_to_decode() {
        let mut document = document();
        document.fields.insert(
            "name".into(),
            Value::from(ValueType::IntegerValue("99999999999999999999".into())),
        );
        let snapshot = DocumentSnapshot::from_document(document, None);
        assert!(snapshot.data::<serde_json::Value>().is_err());
    }
}
