//! Record model for rows fetched from, or written to, a remote collection.
//!
//! Field names are matched case-insensitively everywhere, and field order is
//! preserved so that a row survives a fetch → diff → write cycle unchanged.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::constants::{ID, ODATA_ETAG, SYSTEM_ID};

/// A single field value.
///
/// Scalars keep their JSON kind; nested objects and arrays are carried as raw
/// JSON so they round-trip without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Raw(Value),
}

impl FieldValue {
    /// Textual form used for comparisons: strings as-is, everything else as
    /// its compact JSON text.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::String(s) => Cow::Borrowed(s.as_str()),
            Self::Null => Cow::Borrowed("null"),
            Self::Bool(true) => Cow::Borrowed("true"),
            Self::Bool(false) => Cow::Borrowed("false"),
            Self::Number(n) => Cow::Owned(n.to_string()),
            Self::Raw(v) => Cow::Owned(v.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Raw(v) => v.clone(),
        }
    }

    /// Case-insensitive comparison of the textual forms.
    pub fn text_eq(&self, other: &Self) -> bool {
        eq_ignore_case(&self.as_text(), &other.as_text())
    }
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.clone()),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Raw(value.clone()),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::String(s),
            other => Self::from(&other),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Case-insensitive string equality with an ASCII fast path.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        a.eq_ignore_ascii_case(b)
    } else {
        a.to_lowercase() == b.to_lowercase()
    }
}

/// Ordered field-name → value pairs with case-insensitive name lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a JSON object into a record. Nested values stay raw.
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        let mut record = Self { fields: Vec::with_capacity(object.len()) };
        for (name, value) in object {
            record.insert(name.clone(), FieldValue::from(value));
        }
        record
    }

    /// Flatten a JSON value; `None` unless it is an object.
    pub fn from_json(value: &Value) -> Option<Self> {
        value.as_object().map(Self::from_json_object)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.position(name).map(|idx| &self.fields[idx].1)
    }

    /// Textual form of a field (see [`FieldValue::as_text`]).
    pub fn text(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(FieldValue::as_text)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Insert or replace a field. A replaced field keeps its position and
    /// its original spelling.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.fields[idx].1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.position(name).map(|idx| self.fields.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Remote identifier (`systemId`, falling back to `id`).
    pub fn system_id(&self) -> Option<&str> {
        [SYSTEM_ID, ID]
            .into_iter()
            .filter_map(|name| self.get(name).and_then(FieldValue::as_str))
            .find(|value| !value.is_empty())
    }

    /// Concurrency token of the last fetch or write.
    pub fn etag(&self) -> Option<&str> {
        self.get(ODATA_ETAG).and_then(FieldValue::as_str).filter(|value| !value.is_empty())
    }

    /// Natural-key value; `None` when the field is missing, null or empty.
    pub fn key(&self, key_field: &str) -> Option<Cow<'_, str>> {
        match self.get(key_field)? {
            FieldValue::Null => None,
            value => Some(value.as_text()).filter(|text| !text.is_empty()),
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.to_json_object())
    }

    pub fn to_json_object(&self) -> Map<String, Value> {
        self.fields.iter().map(|(name, value)| (name.clone(), value.to_json())).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(existing, _)| eq_ignore_case(existing, name))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_json_object(&object))
    }
}

/// Records keyed by natural key, compared case-insensitively.
///
/// Inserting a key that is already present replaces the earlier record, so a
/// paginated read ends up holding the last page's version of every key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordCollection {
    records: BTreeMap<String, (String, Record)>,
}

impl RecordCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; returns the record previously held for the key.
    pub fn insert(&mut self, key: impl Into<String>, record: Record) -> Option<Record> {
        let key = key.into();
        self.records.insert(key.to_lowercase(), (key, record)).map(|(_, previous)| previous)
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(&key.to_lowercase()).map(|(_, record)| record)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(&key.to_lowercase())
    }

    pub fn remove(&mut self, key: &str) -> Option<Record> {
        self.records.remove(&key.to_lowercase()).map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keys as spelled by the latest insert, in case-folded order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.values().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.records.values().map(|(key, record)| (key.as_str(), record))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Record {
        Record::from_json(&json!({
            "@odata.etag": "W/\"JzQ0O0\"",
            "systemId": "8a1f",
            "number": "1000",
            "unitPrice": 12.5,
            "blocked": false,
            "gtin": null,
            "dimensions": [{ "code": "AREA", "value": "10" }]
        }))
        .unwrap()
    }

    #[test]
    fn flattens_scalars_and_keeps_nested_values_raw() {
        let record = sample();

        assert_eq!(record.get("number"), Some(&FieldValue::String("1000".into())));
        assert_eq!(record.text("unitPrice").as_deref(), Some("12.5"));
        assert_eq!(record.text("blocked").as_deref(), Some("false"));
        assert_eq!(record.get("gtin"), Some(&FieldValue::Null));
        assert!(matches!(record.get("dimensions"), Some(FieldValue::Raw(Value::Array(_)))));
        assert_eq!(record.text("dimensions").as_deref(), Some(r#"[{"code":"AREA","value":"10"}]"#));
    }

    #[test]
    fn field_lookup_ignores_case() {
        let record = sample();
        assert_eq!(record.system_id(), Some("8a1f"));
        assert!(record.contains("SYSTEMID"));
        assert_eq!(record.etag(), Some("W/\"JzQ0O0\""));
    }

    #[test]
    fn key_skips_null_and_empty_values() {
        let record = sample();
        assert_eq!(record.key("Number").as_deref(), Some("1000"));
        assert_eq!(record.key("gtin"), None);
        assert_eq!(record.key("missing"), None);

        let mut blank = Record::new();
        blank.insert("number", "");
        assert_eq!(blank.key("number"), None);
    }

    #[test]
    fn insert_replaces_in_place_and_keeps_spelling() {
        let mut record = sample();
        record.insert("NUMBER", "2000");

        let names: Vec<&str> = record.iter().map(|(name, _)| name).collect();
        assert!(names.contains(&"number"));
        assert!(!names.contains(&"NUMBER"));
        assert_eq!(record.text("number").as_deref(), Some("2000"));
    }

    #[test]
    fn system_id_falls_back_to_id() {
        let record = Record::from_json(&json!({ "id": "abc", "number": "1" })).unwrap();
        assert_eq!(record.system_id(), Some("abc"));
        assert_eq!(record.etag(), None);
    }

    #[test]
    fn json_round_trip_preserves_values() {
        let source = json!({
            "number": "1000",
            "unitPrice": 12.5,
            "tags": { "a": [1, 2] }
        });
        let record: Record = serde_json::from_value(source.clone()).unwrap();
        assert_eq!(serde_json::to_value(&record).unwrap(), source);
    }

    #[test]
    fn field_order_survives_fetch_and_write() {
        let body = r#"{"number":"1000","displayName":"Chair","blocked":false,"@odata.etag":"W/1"}"#;
        let record: Record = serde_json::from_str(body).unwrap();

        let names: Vec<&str> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["number", "displayName", "blocked", "@odata.etag"]);
        assert_eq!(serde_json::to_string(&record.to_json()).unwrap(), body);
    }

    #[test]
    fn collection_keys_are_case_insensitive_and_last_write_wins() {
        let mut collection = RecordCollection::new();
        let mut first = Record::new();
        first.insert("description", "first");
        let mut second = Record::new();
        second.insert("description", "second");

        assert!(collection.insert("ABC", first).is_none());
        let previous = collection.insert("abc", second);

        assert_eq!(previous.unwrap().text("description").as_deref(), Some("first"));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get("Abc").unwrap().text("description").as_deref(), Some("second"));
        assert!(collection.contains_key("aBC"));
    }

    #[test]
    fn text_eq_compares_case_insensitively() {
        assert!(FieldValue::from("Gray").text_eq(&FieldValue::from("GRAY")));
        assert!(FieldValue::from("1").text_eq(&FieldValue::from(&json!(1))));
        assert!(!FieldValue::from("1.0").text_eq(&FieldValue::from(&json!(1))));
        assert!(eq_ignore_case("ÄPFEL", "äpfel"));
    }
}
