//! Operation Options
//!
//! Suite files carry an open JSON-like map of options. On load it is narrowed to a
//! closed set of value shapes so it can cross the IPC boundary and be coerced into
//! numeric report arguments without re-inspecting JSON.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Name of the option that controls UTF-8 validation during deserialization
pub const VALIDATION_OPTION: &str = "validation";

/// Value of a single option
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum OptionValue {
    /// `true` / `false`
    Bool(bool),
    /// Any JSON number
    Number(f64),
    /// `validation: { utf8: <bool> }`
    Utf8Validation(bool),
    /// Anything else, kept as JSON text
    Other(String),
}

impl OptionValue {
    fn from_json(name: &str, value: Value) -> Self {
        if name == VALIDATION_OPTION {
            // A non-boolean utf8 flag counts as "validate"
            let utf8 = match &value {
                Value::Object(map) => map.get("utf8").and_then(Value::as_bool).unwrap_or(true),
                Value::Bool(b) => *b,
                _ => true,
            };
            return OptionValue::Utf8Validation(utf8);
        }

        match value {
            Value::Bool(b) => OptionValue::Bool(b),
            Value::Number(n) => match n.as_f64() {
                Some(f) => OptionValue::Number(f),
                None => OptionValue::Other(n.to_string()),
            },
            other => OptionValue::Other(other.to_string()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            OptionValue::Bool(b) => Value::Bool(*b),
            OptionValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            OptionValue::Utf8Validation(utf8) => {
                let mut map = Map::new();
                map.insert("utf8".to_string(), Value::Bool(*utf8));
                Value::Object(map)
            }
            OptionValue::Other(text) => {
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
            }
        }
    }
}

/// Named option entry
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct NamedOption {
    /// Option name as written in the suite file
    pub name: String,
    /// Parsed value
    pub value: OptionValue,
}

/// Options passed to the operation under test, ordered by name
#[derive(
    Debug, Clone, Default, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize,
    RkyvDeserialize,
)]
#[archive(check_bytes)]
#[serde(
    from = "BTreeMap<String, Value>",
    into = "BTreeMap<String, Value>"
)]
pub struct OperationOptions {
    entries: Vec<NamedOption>,
}

impl OperationOptions {
    /// Empty option set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; replaces an existing entry with the same name
    pub fn with(mut self, name: impl Into<String>, value: OptionValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace an option, keeping entries sorted by name
    pub fn insert(&mut self, name: impl Into<String>, value: OptionValue) {
        let name = name.into();
        match self
            .entries
            .binary_search_by(|entry| entry.name.as_str().cmp(name.as_str()))
        {
            Ok(idx) => self.entries[idx].value = value,
            Err(idx) => self.entries.insert(idx, NamedOption { name, value }),
        }
    }

    /// Look up an option by name
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries
            .binary_search_by(|entry| entry.name.as_str().cmp(name))
            .ok()
            .map(|idx| &self.entries[idx].value)
    }

    /// Whether UTF-8 validation is requested (enabled unless explicitly disabled)
    pub fn utf8_validation(&self) -> bool {
        match self.get(VALIDATION_OPTION) {
            Some(OptionValue::Utf8Validation(utf8)) => *utf8,
            _ => true,
        }
    }

    /// Iterate entries in name order
    pub fn iter(&self) -> impl Iterator<Item = &NamedOption> {
        self.entries.iter()
    }

    /// Number of options
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no options are set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for OperationOptions {
    fn from(map: BTreeMap<String, Value>) -> Self {
        // BTreeMap iteration is sorted, which keeps `entries` searchable
        let entries = map
            .into_iter()
            .map(|(name, value)| {
                let value = OptionValue::from_json(&name, value);
                NamedOption { name, value }
            })
            .collect();
        Self { entries }
    }
}

impl From<OperationOptions> for BTreeMap<String, Value> {
    fn from(options: OperationOptions) -> Self {
        options
            .entries
            .into_iter()
            .map(|entry| {
                let value = entry.value.to_json();
                (entry.name, value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> OperationOptions {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_value_shapes() {
        let options = parse(
            r#"{
                "promoteLongs": true,
                "index": 3,
                "validation": { "utf8": false },
                "fieldsAsRaw": { "a": true }
            }"#,
        );

        assert_eq!(options.get("promoteLongs"), Some(&OptionValue::Bool(true)));
        assert_eq!(options.get("index"), Some(&OptionValue::Number(3.0)));
        assert_eq!(
            options.get("validation"),
            Some(&OptionValue::Utf8Validation(false))
        );
        assert!(matches!(options.get("fieldsAsRaw"), Some(OptionValue::Other(_))));
        assert!(!options.utf8_validation());
    }

    #[test]
    fn test_validation_without_boolean_is_enabled() {
        let options = parse(r#"{ "validation": { "utf8": { "a": true } } }"#);
        assert!(options.utf8_validation());
        assert!(OperationOptions::new().utf8_validation());
    }

    #[test]
    fn test_insert_keeps_lookup_working() {
        let options = OperationOptions::new()
            .with("useBigInt64", OptionValue::Bool(true))
            .with("checkKeys", OptionValue::Bool(false))
            .with("useBigInt64", OptionValue::Bool(false));

        assert_eq!(options.len(), 2);
        assert_eq!(options.get("useBigInt64"), Some(&OptionValue::Bool(false)));
        assert_eq!(options.get("checkKeys"), Some(&OptionValue::Bool(false)));
        let names: Vec<_> = options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["checkKeys", "useBigInt64"]);
    }

    #[test]
    fn test_serializes_back_to_json_map() {
        let options = parse(r#"{ "validation": { "utf8": true }, "raw": "yes" }"#);
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value["validation"]["utf8"], Value::Bool(true));
        assert_eq!(value["raw"], Value::String("yes".to_string()));
    }
}
