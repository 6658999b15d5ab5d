// action.rs — The proposed action and evaluation context.
//
// A proposed action is an open attribute bag (JSON object). Predicates read
// the keys they know about and ignore the rest, so callers can attach any
// extra metadata without breaking evaluation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of reading a typed attribute from an attribute bag.
#[derive(Debug, Clone, PartialEq)]
pub enum Attr<T> {
    Present(T),
    Missing,
    /// The key exists but holds a value of the wrong JSON type.
    WrongType,
}

/// An action an AI assistant wants to run against live infrastructure.
///
/// ```json
/// {"type": "create_cluster", "target": "prod-east", "nodeCount": 12, "gpuEnabled": true}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposedAction {
    attributes: Map<String, Value>,
}

impl ProposedAction {
    /// An action with only its `type` set.
    pub fn new(action_type: impl Into<String>) -> Self {
        let mut attributes = Map::new();
        attributes.insert("type".to_string(), Value::String(action_type.into()));
        Self { attributes }
    }

    /// Build from an arbitrary JSON value. Non-objects become an empty bag.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(attributes) => Self { attributes },
            _ => Self::default(),
        }
    }

    /// Set an attribute and return self (builder pattern).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Declared action type, e.g. "delete_cluster".
    pub fn action_type(&self) -> Option<&str> {
        self.attributes.get("type").and_then(Value::as_str)
    }

    /// What the action operates on, e.g. "prod-cluster".
    pub fn target(&self) -> Option<&str> {
        self.attributes.get("target").and_then(Value::as_str)
    }

    /// One-line summary: "<type> on <target>", missing parts as "unknown".
    pub fn summary(&self) -> String {
        format!(
            "{} on {}",
            self.action_type().unwrap_or("unknown"),
            self.target().unwrap_or("unknown")
        )
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn bool_attr(&self, key: &str) -> Attr<bool> {
        typed(&self.attributes, key, Value::as_bool)
    }

    pub fn number_attr(&self, key: &str) -> Attr<f64> {
        typed(&self.attributes, key, Value::as_f64)
    }

    pub fn str_attr(&self, key: &str) -> Attr<&str> {
        typed(&self.attributes, key, Value::as_str)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }
}

/// Cross-cutting facts that aren't part of the action itself,
/// e.g. `{"approvedRegions": ["us-east-1", "eu-west-1"]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationContext {
    values: Map<String, Value>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Shorthand for setting `approvedRegions`.
    pub fn with_approved_regions<I, S>(self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<Value> = regions
            .into_iter()
            .map(|r| Value::String(r.into()))
            .collect();
        self.with("approvedRegions", Value::Array(list))
    }

    /// Read a list of strings. Non-string elements are ignored.
    pub fn string_list(&self, key: &str) -> Attr<Vec<&str>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Attr::Missing,
            Some(Value::Array(items)) => {
                Attr::Present(items.iter().filter_map(Value::as_str).collect())
            }
            Some(_) => Attr::WrongType,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn typed<'a, T>(
    map: &'a Map<String, Value>,
    key: &str,
    read: impl Fn(&'a Value) -> Option<T>,
) -> Attr<T> {
    match map.get(key) {
        None | Some(Value::Null) => Attr::Missing,
        Some(value) => match read(value) {
            Some(v) => Attr::Present(v),
            None => Attr::WrongType,
        },
    }
}
