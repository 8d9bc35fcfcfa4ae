use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Free-form key/value document forwarded to the backend without validation.
pub type Payload = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOption {
    pub selector: String,
    pub desc: bool,
    pub is_expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOption {
    pub selector: String,
    pub desc: bool,
}

impl SortOption {
    pub fn asc(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            desc: false,
        }
    }

    pub fn desc(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            desc: true,
        }
    }
}

/// Options of a `list` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    /// Deprecated by the backend, kept for older servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<GroupOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortOption>>,
    /// Number of records to skip, e.g. `skip: 15` lists from the 16th record on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    /// Number of records to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<u64>,
    /// Deprecated by the backend, kept for older servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Map<String, Value>>,
    /// Deprecated by the backend, kept for older servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

/// Options of an `aggregate` call. Same shape as [`ListOptions`].
pub type AggregateOptions = ListOptions;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    /// Deprecated by the backend, kept for older servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

/// Grouping request for the `aggregate` operation.
///
/// The server turns it into a SQL projection. Each entry of `params` is either:
///
/// * a single element: a record field, selected as is;
/// * several elements: `[function, args..., alias]`. Arguments that are record fields must
///   also be listed in `fields`, which is how the server tells fields from literal
///   parameters.
///
/// ```
/// use noapi_core::types::Aggregation;
///
/// let aggregation = Aggregation::default()
///     .param(["COUNT", "id", "qtd"])
///     .param(["DATE_FORMAT", "_createdAt", "%Y-%m", "createdAt"])
///     .field("id")
///     .field("_createdAt")
///     .group_by("createdAt");
///
/// // SELECT COUNT(`id`) as qtd, DATE_FORMAT(`_createdAt`, "%Y-%m") as createdAt ... GROUP BY `createdAt`
/// assert_eq!(aggregation.params.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub params: Vec<Vec<String>>,
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<String>>,
}

impl Aggregation {
    pub fn param<I, S>(mut self, param: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params.push(param.into_iter().map(Into::into).collect());
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    pub fn group_by(mut self, alias: impl Into<String>) -> Self {
        self.group.get_or_insert_with(Vec::new).push(alias.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOptions {
    /// Which session engine the backend should use for this login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avoid_auth: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_url: Option<String>,
}

/// A login identity value (an email, a user name, a numeric id...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identity {
    Text(String),
    Number(Number),
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity::Text(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity::Text(value)
    }
}

impl From<i64> for Identity {
    fn from(value: i64) -> Self {
        Identity::Number(value.into())
    }
}

impl From<u64> for Identity {
    fn from(value: u64) -> Self {
        Identity::Number(value.into())
    }
}

/// Identity fields of a login, merged at the top level of the request body.
pub type LoginIdentities = BTreeMap<String, Identity>;
