//! # Wire Types
//!
//! Plain data-transfer shapes exchanged with a NOAPI backend. None of them carry
//! invariants beyond matching the JSON the server expects.
mod filter;
mod options;
mod permissions;
mod response;

pub use filter::*;
pub use options::*;
pub use permissions::*;
pub use response::*;

use serde::{Deserialize, Serialize};

/// Operation requested against the resource endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    List,
    Read,
    Insert,
    Update,
    Delete,
    Aggregate,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Read => "read",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Aggregate => "aggregate",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a call to the resource endpoint.
///
/// Absent fields are left out of the serialized JSON entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequest {
    pub resource: String,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_auth: Option<String>,
}

impl ResourceRequest {
    pub fn new(resource: impl Into<String>, operation: Operation) -> Self {
        Self {
            resource: resource.into(),
            operation,
            filter: None,
            data: None,
            aggregation: None,
            options: None,
            use_auth: None,
        }
    }
}

/// JavaScript-style truthiness, which is how the backend's loosely typed flags are read.
pub(crate) fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_request_omits_absent_fields() {
        let mut request = ResourceRequest::new("users", Operation::Delete);
        request.filter = Some(Filter::eq("id", 3));
        request.use_auth = Some("admin".to_string());

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "resource": "users",
                "operation": "delete",
                "filter": ["id", "=", 3],
                "useAuth": "admin"
            })
        );
    }

    #[test]
    fn truthiness_follows_javascript() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("yes")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }
}
