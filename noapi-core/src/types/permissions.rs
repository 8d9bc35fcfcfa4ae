use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Description of a readable field, as returned in `resourcesAllowed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadField {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Description of a writable field (insert or update).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteField {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub trait FieldSpec {
    fn name(&self) -> &str;
}

impl FieldSpec for ReadField {
    fn name(&self) -> &str {
        &self.name
    }
}

impl FieldSpec for WriteField {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A granted field: either its bare name or a full description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowedField<T> {
    Name(String),
    Described(T),
}

impl<T: FieldSpec> AllowedField<T> {
    pub fn name(&self) -> &str {
        match self {
            AllowedField::Name(name) => name,
            AllowedField::Described(spec) => spec.name(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationsAllowed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<Vec<AllowedField<ReadField>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert: Option<Vec<AllowedField<WriteField>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Vec<AllowedField<WriteField>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Insert,
    Update,
    Delete,
}

/// Permission map: resource name to the operations the current user may perform on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourcesAllowed(BTreeMap<String, OperationsAllowed>);

impl ResourcesAllowed {
    pub fn new(resources: BTreeMap<String, OperationsAllowed>) -> Self {
        Self(resources)
    }

    pub fn get(&self, resource: &str) -> Option<&OperationsAllowed> {
        self.0.get(resource)
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `permission` is granted on `resource`.
    ///
    /// Field based permissions are granted when at least one field is listed; delete is
    /// granted only by an explicit `true`.
    pub fn allows(&self, resource: &str, permission: Permission) -> bool {
        let Some(ops) = self.get(resource) else {
            return false;
        };
        match permission {
            Permission::Read => ops.read.as_ref().is_some_and(|f| !f.is_empty()),
            Permission::Insert => ops.insert.as_ref().is_some_and(|f| !f.is_empty()),
            Permission::Update => ops.update.as_ref().is_some_and(|f| !f.is_empty()),
            Permission::Delete => ops.delete.unwrap_or(false),
        }
    }

    /// Names of the fields granted for `permission` on `resource`.
    pub fn fields(&self, resource: &str, permission: Permission) -> Vec<&str> {
        let Some(ops) = self.get(resource) else {
            return Vec::new();
        };
        match permission {
            Permission::Read => names(ops.read.as_deref()),
            Permission::Insert => names(ops.insert.as_deref()),
            Permission::Update => names(ops.update.as_deref()),
            Permission::Delete => Vec::new(),
        }
    }
}

fn names<T: FieldSpec>(fields: Option<&[AllowedField<T>]>) -> Vec<&str> {
    fields
        .unwrap_or_default()
        .iter()
        .map(AllowedField::name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ResourcesAllowed {
        serde_json::from_value(json!({
            "users": {
                "read": ["name", {"name": "email", "type": "string", "label": "E-mail"}],
                "insert": [{"name": "name", "required": true, "choices": ["a", 1]}],
                "update": [],
                "delete": true
            },
            "logs": {"read": ["message"]}
        }))
        .unwrap()
    }

    #[test]
    fn decodes_mixed_field_lists() {
        let allowed = sample();
        let users = allowed.get("users").unwrap();

        assert_eq!(users.read.as_ref().unwrap().len(), 2);
        assert!(matches!(
            &users.read.as_ref().unwrap()[1],
            AllowedField::Described(ReadField { kind: Some(k), .. }) if k == "string"
        ));
        assert_eq!(allowed.resources().collect::<Vec<_>>(), vec!["logs", "users"]);
    }

    #[test]
    fn answers_permission_queries() {
        let allowed = sample();

        assert!(allowed.allows("users", Permission::Read));
        assert!(allowed.allows("users", Permission::Insert));
        assert!(!allowed.allows("users", Permission::Update));
        assert!(allowed.allows("users", Permission::Delete));
        assert!(!allowed.allows("logs", Permission::Delete));
        assert!(!allowed.allows("missing", Permission::Read));
    }

    #[test]
    fn lists_granted_field_names() {
        let allowed = sample();

        assert_eq!(allowed.fields("users", Permission::Read), vec!["name", "email"]);
        assert_eq!(allowed.fields("users", Permission::Insert), vec!["name"]);
        assert!(allowed.fields("users", Permission::Delete).is_empty());
        assert!(allowed.fields("missing", Permission::Read).is_empty());
    }
}
