use super::models::{ArrayValue, MapValue, Value, ValueType};
use super::FirestoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::Error as _;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

/// The fields of a single document write.
///
/// Besides plain values a write can name fields that the server fills with
/// its own commit time, which is how `createdAt` gets a store-assigned value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteFields {
    fields: HashMap<String, Value>,
    server_timestamps: Vec<String>,
}

impl WriteFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts a struct or map into fields, one per top-level key.
    ///
    /// Strings stay strings; use [`WriteFields::with_timestamp`] for timestamps.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, FirestoreError> {
        match serde_json::to_value(value)? {
            JsonValue::Object(object) => Ok(Self {
                fields: json_to_fields(object)?,
                server_timestamps: Vec::new(),
            }),
            other => Err(serde_json::Error::custom(format!(
                "a document must be an object, not {other}"
            ))
            .into()),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        self.server_timestamps.retain(|f| *f != field);
        self.fields.insert(field, value.into());
        self
    }

    /// Sets a client-side timestamp.
    pub fn with_timestamp(self, field: impl Into<String>, at: DateTime<Utc>) -> Self {
        let value = ValueType::TimestampValue(at.to_rfc3339_opts(SecondsFormat::Micros, true));
        self.with(field, Value::from(value))
    }

    /// Marks `field` to be set to the server's commit time.
    pub fn with_server_timestamp(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.fields.remove(&field);
        if !self.server_timestamps.contains(&field) {
            self.server_timestamps.push(field);
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &HashMap<String, Value> {
        &self.fields
    }

    pub fn server_timestamps(&self) -> &[String] {
        &self.server_timestamps
    }

    /// Every field this write touches, sorted, as quoted field paths.
    pub fn field_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .fields
            .keys()
            .chain(self.server_timestamps.iter())
            .map(|f| quote_field_path(f))
            .collect();
        paths.sort();
        paths
    }

    pub(crate) fn into_parts(self) -> (HashMap<String, Value>, Vec<String>) {
        (self.fields, self.server_timestamps)
    }
}

fn json_to_fields(object: Map<String, JsonValue>) -> Result<HashMap<String, Value>, FirestoreError> {
    object
        .into_iter()
        .map(|(name, value)| -> Result<_, FirestoreError> { Ok((name, json_to_value(value)?)) })
        .collect()
}

fn json_to_value(value: JsonValue) -> Result<Value, FirestoreError> {
    let value_type = match value {
        JsonValue::Null => ValueType::NullValue(()),
        JsonValue::Bool(b) => ValueType::BooleanValue(b),
        JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => ValueType::IntegerValue(i.to_string()),
            (None, Some(d)) => ValueType::DoubleValue(d),
            (None, None) => {
                return Err(serde_json::Error::custom(format!("unsupported number {n}")).into())
            }
        },
        JsonValue::String(s) => ValueType::StringValue(s),
        JsonValue::Array(items) => ValueType::ArrayValue(ArrayValue {
            values: items
                .into_iter()
                .map(json_to_value)
                .collect::<Result<Vec<_>, _>>()?,
        }),
        JsonValue::Object(object) => ValueType::MapValue(MapValue {
            fields: json_to_fields(object)?,
        }),
    };
    Ok(value_type.into())
}

/// Field names that are not plain identifiers must be backtick-quoted in masks.
pub(crate) fn quote_field_path(field: &str) -> String {
    let mut chars = field.chars();
    let simple = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        field.to_string()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn server_timestamp_replaces_plain_value() {
        let fields = WriteFields::new()
            .with("text", "hi")
            .with("createdAt", "client")
            .with_server_timestamp("createdAt");

        assert!(fields.get("createdAt").is_none());
        assert_eq!(fields.server_timestamps(), ["createdAt".to_string()]);
        assert_eq!(fields.field_paths(), vec!["createdAt", "text"]);
    }

    #[test]
    fn timestamps_are_rfc3339_utc() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let fields = WriteFields::new().with_timestamp("createdAt", at);
        assert_eq!(
            fields.get("createdAt").map(|v| &v.value_type),
            Some(&ValueType::TimestampValue("2024-05-01T12:30:00.000000Z".into()))
        );
    }

    #[test]
    fn odd_field_names_are_quoted() {
        assert_eq!(quote_field_path("isOnline"), "isOnline");
        assert_eq!(quote_field_path("photo-url"), "`photo-url`");
        assert_eq!(quote_field_path("1st"), "`1st`");
    }

    #[test]
    fn from_serializable_rejects_non_objects() {
        assert!(WriteFields::from_serializable(&"just a string").is_err());
    }

    #[test]
    fn from_serializable_maps_json_kinds() {
        let fields = WriteFields::from_serializable(&serde_json::json!({
            "name": "ana",
            "age": 30,
            "score": 1.5,
            "tags": ["a"],
            "photo": null,
            "prefs": { "dark": true }
        }))
        .unwrap();

        assert_eq!(fields.get("name"), Some(&Value::from("ana")));
        assert_eq!(fields.get("age"), Some(&Value::from(30i64)));
        assert_eq!(
            fields.get("score"),
            Some(&Value::from(ValueType::DoubleValue(1.5)))
        );
        assert_eq!(
            fields.get("tags"),
            Some(&Value::from(ValueType::ArrayValue(ArrayValue {
                values: vec![Value::from("a")]
            })))
        );
        assert_eq!(fields.get("photo"), Some(&Value::from(ValueType::NullValue(()))));
        let mut prefs = HashMap::new();
        prefs.insert("dark".to_string(), Value::from(true));
        assert_eq!(
            fields.get("prefs"),
            Some(&Value::from(ValueType::MapValue(MapValue { fields: prefs })))
        );
    }
}
