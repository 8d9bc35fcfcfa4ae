//! # NOAPI Mock Backend
//!
//! **INTERNAL USE ONLY**: an in-memory NOAPI backend implementing [`Transport`], used to
//! integration test `noapi-core` without a network. It is not intended for production use.
//!
//! Resource calls support `list`, `read`, `insert`, `update`, `delete` and `aggregate`
//! over seeded records. Auth calls keep a single session. Every request is recorded so
//! tests can assert on the exact wire shape.
mod query;

use async_trait::async_trait;
use http::HeaderMap;
use noapi_core::{
    client::{DEFAULT_AUTH_URN, DEFAULT_RESOURCE_URN},
    http::{Transport, TransportError},
};
use serde_json::{Map, Value, json};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// A request as the backend received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Default)]
struct State {
    resources: BTreeMap<String, Vec<Value>>,
    users: Vec<Value>,
    session: Option<Value>,
    resources_allowed: Value,
    tokens: BTreeMap<String, String>,
    requires_auth: bool,
    offline: bool,
    next_id: u64,
    requests: Vec<RecordedRequest>,
}

/// Cheap to clone; clones share the same data.
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<Mutex<State>>,
    resource_path: String,
    auth_path: String,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                resources_allowed: json!({}),
                ..Default::default()
            })),
            resource_path: DEFAULT_RESOURCE_URN.to_string(),
            auth_path: DEFAULT_AUTH_URN.to_string(),
        }
    }

    /// Serves the endpoints under other paths than the defaults.
    pub fn with_paths(mut self, resource_path: &str, auth_path: &str) -> Self {
        self.resource_path = resource_path.to_string();
        self.auth_path = auth_path.to_string();
        self
    }

    /// Seeds `resource`. Records without an `_id` get one.
    pub fn with_resource(self, resource: &str, records: Vec<Value>) -> Self {
        {
            let mut state = self.lock();
            let records = records
                .into_iter()
                .map(|record| state.with_id(record))
                .collect();
            state.resources.insert(resource.to_string(), records);
        }
        self
    }

    /// Registers a user able to log in. It must carry a `password` field.
    pub fn with_user(self, user: Value) -> Self {
        self.lock().users.push(user);
        self
    }

    /// Permission map returned alongside the user on `read`.
    pub fn with_resources_allowed(self, allowed: Value) -> Self {
        self.lock().resources_allowed = allowed;
        self
    }

    /// Rejects resource calls while no one is logged in.
    pub fn requiring_auth(self) -> Self {
        self.lock().requires_auth = true;
        self
    }

    /// While offline every call fails at the transport level.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Drops the session server side, as an expired cookie would.
    pub fn expire_session(&self) {
        self.lock().session = None;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.lock().requests.last().cloned()
    }

    pub fn records(&self, resource: &str) -> Vec<Value> {
        self.lock()
            .resources
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }

    /// The recovery token issued to `email`, if any.
    pub fn issued_token(&self, email: &str) -> Option<String> {
        self.lock()
            .tokens
            .iter()
            .find(|(_, owner)| owner.as_str() == email)
            .map(|(token, _)| token.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MockBackend {
    async fn post(
        &self,
        url: &str,
        headers: HeaderMap,
        body: Value,
    ) -> Result<Value, TransportError> {
        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            url: url.to_string(),
            headers,
            body: body.clone(),
        });

        if state.offline {
            return Err(TransportError::Other("backend is offline".to_string()));
        }

        if url.ends_with(&self.resource_path) {
            Ok(state.resource(&body))
        } else if url.ends_with(&self.auth_path) {
            Ok(state.auth(&body))
        } else {
            Err(TransportError::Status {
                url: url.to_string(),
                status: 404,
                body: "Not Found".to_string(),
            })
        }
    }
}

impl State {
    fn authenticated(&self) -> bool {
        self.session.is_some()
    }

    fn success(&self, data: Value) -> Value {
        json!({
            "status": "success",
            "statusCode": 200,
            "data": data,
            "auth": self.authenticated(),
        })
    }

    fn failure(&self, status_code: u16, error: &str, message: impl Into<String>) -> Value {
        json!({
            "status": "error",
            "statusCode": status_code,
            "data": {"error": error, "errorMessage": message.into()},
            "auth": self.authenticated(),
        })
    }

    fn with_id(&mut self, mut record: Value) -> Value {
        if let Some(object) = record.as_object_mut()
            && !object.contains_key("_id")
        {
            self.next_id += 1;
            object.insert("_id".to_string(), Value::String(format!("id-{}", self.next_id)));
        }
        record
    }

    fn resource(&mut self, body: &Value) -> Value {
        if self.requires_auth && !self.authenticated() {
            return self.failure(401, "NotAuthorized", "Login required");
        }

        let resource = body.get("resource").and_then(Value::as_str).unwrap_or_default();
        if !self.resources.contains_key(resource) {
            return self.failure(404, "ResourceNotFound", format!("Unknown resource '{resource}'"));
        }

        let filter = body.get("filter").unwrap_or(&Value::Null);
        let result = match body.get("operation").and_then(Value::as_str) {
            Some("list" | "read") => self.list(resource, filter, body.get("options")),
            Some("insert") => self.insert(resource, body.get("data")),
            Some("update") => self.update(resource, filter, body.get("data")),
            Some("delete") => self.delete(resource, filter),
            Some("aggregate") => self.aggregate(resource, filter, body.get("aggregation")),
            other => Err(format!("Unknown operation {other:?}")),
        };

        match result {
            Ok(response) => response,
            Err(message) => self.failure(400, "InvalidRequest", message),
        }
    }

    fn matching(&self, resource: &str, filter: &Value) -> Result<Vec<&Value>, String> {
        let mut found = Vec::new();
        for record in self.resources.get(resource).into_iter().flatten() {
            if query::matches(filter, record)? {
                found.push(record);
            }
        }
        Ok(found)
    }

    fn list(
        &self,
        resource: &str,
        filter: &Value,
        options: Option<&Value>,
    ) -> Result<Value, String> {
        let mut records = self.matching(resource, filter)?;
        let options = options.cloned().unwrap_or(Value::Null);

        if let Some(sort) = options.get("sort").and_then(Value::as_array) {
            // Stable sorts applied from the last key to the first
            for rule in sort.iter().rev() {
                let selector = rule.get("selector").and_then(Value::as_str).unwrap_or_default();
                let desc = rule.get("desc").and_then(Value::as_bool).unwrap_or(false);
                records.sort_by(|a, b| {
                    let ordering = query::sort_order(
                        query::lookup(a, selector).unwrap_or(&Value::Null),
                        query::lookup(b, selector).unwrap_or(&Value::Null),
                    );
                    if desc { ordering.reverse() } else { ordering }
                });
            }
        }

        let total = records.len();
        let skip = options.get("skip").and_then(Value::as_u64);
        let take = options.get("take").and_then(Value::as_u64);
        let page: Vec<Value> = records
            .into_iter()
            .skip(skip.unwrap_or(0) as usize)
            .take(take.map_or(usize::MAX, |n| n as usize))
            .cloned()
            .collect();

        let mut response = self.success(Value::Array(page));
        if skip.is_some() || take.is_some() {
            response["totalCount"] = Value::from(total);
        }
        Ok(response)
    }

    fn insert(&mut self, resource: &str, data: Option<&Value>) -> Result<Value, String> {
        let data = data
            .filter(|d| d.is_object())
            .cloned()
            .ok_or("insert requires an object")?;
        let record = self.with_id(data);
        self.resources
            .entry(resource.to_string())
            .or_default()
            .push(record.clone());
        Ok(self.success(record))
    }

    fn update(
        &mut self,
        resource: &str,
        filter: &Value,
        data: Option<&Value>,
    ) -> Result<Value, String> {
        require_filter(filter)?;
        let changes = data
            .and_then(Value::as_object)
            .cloned()
            .ok_or("update requires an object")?;

        let mut updated = Vec::new();
        for record in self.resources.entry(resource.to_string()).or_default() {
            if !query::matches(filter, record)? {
                continue;
            }
            if let Some(object) = record.as_object_mut() {
                for (key, value) in &changes {
                    if key != "_id" {
                        object.insert(key.clone(), value.clone());
                    }
                }
            }
            updated.push(record.clone());
        }
        Ok(self.success(Value::Array(updated)))
    }

    fn delete(&mut self, resource: &str, filter: &Value) -> Result<Value, String> {
        require_filter(filter)?;
        let records = self.resources.entry(resource.to_string()).or_default();

        let doomed = records
            .iter()
            .map(|record| query::matches(filter, record))
            .collect::<Result<Vec<bool>, String>>()?;
        let before = records.len();
        let mut doomed = doomed.into_iter();
        records.retain(|_| !doomed.next().unwrap_or(false));
        let deleted = before - records.len();

        Ok(self.success(json!({ "deleted": deleted })))
    }

    fn aggregate(
        &self,
        resource: &str,
        filter: &Value,
        aggregation: Option<&Value>,
    ) -> Result<Value, String> {
        let aggregation = aggregation.ok_or("aggregate requires an aggregation")?;
        let records = self.matching(resource, filter)?;
        let rows = query::aggregate(&records, aggregation)?;
        Ok(self.success(Value::Array(rows)))
    }

    fn auth(&mut self, body: &Value) -> Value {
        match body.get("operation").and_then(Value::as_str) {
            Some("login") => self.login(body),
            Some("logout") => {
                self.session = None;
                self.success(Value::Null)
            }
            Some("read") => match self.session.clone() {
                Some(user) => {
                    let mut response = self.success(user);
                    response["resourcesAllowed"] = self.resources_allowed.clone();
                    response
                }
                None => self.failure(401, "NotAuthenticated", "No active session"),
            },
            Some("recoverPasswordByEmail") => self.recover_password(body),
            Some("recoverPasswordBySms") => {
                self.failure(501, "NotImplemented", "SMS recovery is not available")
            }
            Some("checkToken") => {
                let token = body.get("token").and_then(Value::as_str).unwrap_or_default();
                if self.tokens.contains_key(token) {
                    self.success(json!({ "valid": true }))
                } else {
                    self.failure(400, "InvalidToken", "Token is invalid or expired")
                }
            }
            Some("setPasswordForToken") => self.set_password(body),
            other => self.failure(400, "InvalidRequest", format!("Unknown operation {other:?}")),
        }
    }

    fn login(&mut self, body: &Value) -> Value {
        let identities: Map<String, Value> = body
            .as_object()
            .into_iter()
            .flatten()
            .filter(|(key, _)| !matches!(key.as_str(), "operation" | "remember" | "options"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let user = self.users.iter().find(|user| {
            identities.contains_key("password")
                && identities.len() > 1
                && identities.iter().all(|(key, value)| {
                    user.get(key)
                        .is_some_and(|field| query::loosely_equal(field, value))
                })
        });

        match user.cloned() {
            Some(user) => {
                self.session = Some(public(user));
                let session = self.session.clone().unwrap_or(Value::Null);
                self.success(session)
            }
            None => {
                self.session = None;
                self.failure(401, "InvalidCredentials", "Invalid credentials")
            }
        }
    }

    fn recover_password(&mut self, body: &Value) -> Value {
        let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
        if !self.users.iter().any(|u| u.get("email").and_then(Value::as_str) == Some(email)) {
            return self.failure(404, "UserNotFound", format!("No user with email '{email}'"));
        }

        self.next_id += 1;
        let token = format!("token-{}", self.next_id);
        self.tokens.insert(token.clone(), email.to_string());

        let origin = body.get("originUrl").and_then(Value::as_str).unwrap_or_default();
        self.success(json!({ "link": format!("{origin}/reset-password?token={token}") }))
    }

    fn set_password(&mut self, body: &Value) -> Value {
        let token = body.get("token").and_then(Value::as_str).unwrap_or_default();
        let password = body.get("password").cloned().unwrap_or(Value::Null);

        let Some(email) = self.tokens.remove(token) else {
            return self.failure(400, "InvalidToken", "Token is invalid or expired");
        };

        let user = self
            .users
            .iter_mut()
            .find(|u| u.get("email").and_then(Value::as_str) == Some(email.as_str()));
        match user {
            Some(user) => {
                user["password"] = password;
                let user = public(user.clone());
                self.session = Some(user.clone());
                self.success(user)
            }
            None => self.failure(404, "UserNotFound", format!("No user with email '{email}'")),
        }
    }
}

fn require_filter(filter: &Value) -> Result<(), String> {
    match filter {
        Value::Array(items) if !items.is_empty() => Ok(()),
        _ => Err("a filter is required".to_string()),
    }
}

/// The user without its password.
fn public(mut user: Value) -> Value {
    if let Some(object) = user.as_object_mut() {
        object.remove("password");
    }
    user
}
