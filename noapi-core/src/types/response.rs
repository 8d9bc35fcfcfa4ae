use super::{ResourcesAllowed, is_truthy};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
    /// Anything the SDK does not recognise. Treated as a failure.
    #[serde(other)]
    Unknown,
}

/// The failure carried by a non-success envelope: `data.error` and `data.errorMessage`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error}: {error_message}")]
pub struct ResponseFailure {
    pub error: String,
    pub error_message: String,
}

impl ResponseFailure {
    /// Reads the failure out of an envelope's `data`. Missing parts render as empty text.
    pub fn from_data(data: Option<&Value>) -> Self {
        let part = |key: &str| match data.and_then(|d| d.get(key)) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        Self {
            error: part("error"),
            error_message: part("errorMessage"),
        }
    }
}

/// The response envelope of every NOAPI call.
///
/// On success `data` holds the decoded payload; on any other status the payload is read
/// as a [`ResponseFailure`] instead.
#[derive(Debug, Clone, PartialEq)]
pub struct NapResponse<T = Value> {
    pub status: ResponseStatus,
    pub status_code: u16,
    pub data: Option<T>,
    pub failure: Option<ResponseFailure>,
    pub auth: bool,
    pub resources_allowed: Option<ResourcesAllowed>,
    /// Total number of records matching a paged listing, when the server reports it.
    pub total_count: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    status: ResponseStatus,
    #[serde(default)]
    status_code: u16,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default, deserialize_with = "truthy")]
    auth: bool,
    #[serde(default)]
    resources_allowed: Option<ResourcesAllowed>,
    #[serde(default, deserialize_with = "lenient_count")]
    total_count: Option<u64>,
}

impl<T: DeserializeOwned> NapResponse<T> {
    /// Decodes a raw response body.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_value(value)?;

        let (data, failure) = match envelope.status {
            ResponseStatus::Success => {
                let data = match envelope.data {
                    None | Some(Value::Null) => None,
                    Some(data) => Some(serde_json::from_value(data)?),
                };
                (data, None)
            }
            ResponseStatus::Error | ResponseStatus::Unknown => (
                None,
                Some(ResponseFailure::from_data(envelope.data.as_ref())),
            ),
        };

        Ok(Self {
            status: envelope.status,
            status_code: envelope.status_code,
            data,
            failure,
            auth: envelope.auth,
            resources_allowed: envelope.resources_allowed,
            total_count: envelope.total_count,
        })
    }
}

impl<T> NapResponse<T> {
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// `Ok(data)` on success, the carried failure otherwise.
    pub fn into_result(self) -> Result<Option<T>, ResponseFailure> {
        match self.status {
            ResponseStatus::Success => Ok(self.data),
            _ => Err(self
                .failure
                .unwrap_or_else(|| ResponseFailure::from_data(None))),
        }
    }
}

fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(is_truthy(&value))
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
