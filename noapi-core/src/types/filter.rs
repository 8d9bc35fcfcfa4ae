use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt::Debug, sync::Arc};

/// A filter expression as understood by the backend.
///
/// Filters are nested JSON arrays: a condition is a `[field, operator, value]` triple and
/// conditions are joined by boolean connectors, e.g.
/// `[["age", ">", 18], "AND", ["active", "=", true]]`.
///
/// The wrapper is transparent on the wire; any JSON value the backend accepts can be
/// carried through [`Filter::raw`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Value);

/// Boolean connector between two filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

impl Filter {
    /// A single `[field, operator, value]` condition.
    pub fn condition(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Filter(Value::Array(vec![
            Value::String(field.into()),
            Value::String(operator.into()),
            value.into(),
        ]))
    }

    /// Shorthand for `[field, "=", value]`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(field, "=", value)
    }

    pub fn raw(value: Value) -> Self {
        Filter(value)
    }

    pub fn and(self, other: Filter) -> Self {
        self.connect(Connector::And, other)
    }

    pub fn or(self, other: Filter) -> Self {
        self.connect(Connector::Or, other)
    }

    fn connect(self, connector: Connector, other: Filter) -> Self {
        Filter(Value::Array(vec![
            self.0,
            Value::String(connector.as_str().to_string()),
            other.0,
        ]))
    }

    /// Joins every filter with `connector` into a flat group.
    ///
    /// A single filter is returned as is and an empty input yields an empty group (`[]`).
    pub fn join(filters: impl IntoIterator<Item = Filter>, connector: Connector) -> Self {
        let mut parts: Vec<Value> = Vec::new();
        for filter in filters {
            if !parts.is_empty() {
                parts.push(Value::String(connector.as_str().to_string()));
            }
            parts.push(filter.0);
        }

        if parts.len() == 1 {
            return Filter(parts.remove(0));
        }
        Filter(Value::Array(parts))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Filter {
    fn from(value: Value) -> Self {
        Filter(value)
    }
}

impl From<Filter> for Value {
    fn from(filter: Filter) -> Self {
        filter.0
    }
}

/// Where a store gets its filter from.
///
/// A dynamic source is evaluated each time data is loaded, so the filter can follow state
/// that changes after the store was created.
#[derive(Clone)]
pub enum FilterSource {
    Static(Filter),
    Dynamic(Arc<dyn Fn() -> Filter + Send + Sync>),
}

impl FilterSource {
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn() -> Filter + Send + Sync + 'static,
    {
        FilterSource::Dynamic(Arc::new(f))
    }

    pub fn resolve(&self) -> Filter {
        match self {
            FilterSource::Static(filter) => filter.clone(),
            FilterSource::Dynamic(f) => f(),
        }
    }
}

impl Debug for FilterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterSource::Static(filter) => f.debug_tuple("Static").field(filter).finish(),
            FilterSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<Filter> for FilterSource {
    fn from(filter: Filter) -> Self {
        FilterSource::Static(filter)
    }
}

/// The identity of a record, as handed over by a grid component.
///
/// * `Scalar`: a bare key value matched against the first key field.
/// * `Fields`: an object of key field to value (composite keys).
/// * `Filter`: an already built filter, used verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Scalar(Value),
    Fields(Map<String, Value>),
    Filter(Filter),
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(_) => Key::Filter(Filter(value)),
            Value::Object(map) => Key::Fields(map),
            other => Key::Scalar(other),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Scalar(Value::String(value.to_string()))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Scalar(Value::String(value))
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Scalar(value.into())
    }
}

impl From<u64> for Key {
    fn from(value: u64) -> Self {
        Key::Scalar(value.into())
    }
}

impl From<Map<String, Value>> for Key {
    fn from(value: Map<String, Value>) -> Self {
        Key::Fields(value)
    }
}

impl From<Filter> for Key {
    fn from(value: Filter) -> Self {
        Key::Filter(value)
    }
}
