//! # Middleware
//!
//! Middlewares are pure transforms over the JSON request body (before the call) and the
//! JSON response (after the call).
//!
//! A [`MiddlewareChain`] keeps two ordered lists. Running a list applies every middleware
//! in registration order, feeding each one the value returned by the previous one. The
//! value a middleware returns **replaces** the data, so a middleware that only wants to
//! observe must hand back `ctx.data` unchanged.
//!
//! [`Profiles`] are named lists registered once on the connection service and pulled
//! into a call with [`crate::client::ConnectionModel::with`].
//!
//! ```
//! use noapi_core::middleware::{MiddlewareChain, middleware};
//! use serde_json::json;
//!
//! let stamp = middleware(|mut ctx| {
//!     ctx.data["stamped"] = json!(ctx.round);
//!     ctx.data
//! });
//!
//! let mut chain = MiddlewareChain::default();
//! chain.push_before([stamp.clone(), stamp]);
//!
//! assert_eq!(chain.run_before(json!({})), json!({"stamped": 1}));
//! ```
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashMap, fmt::Debug, sync::Arc};

/// When a middleware runs relative to the HTTP call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecLapse {
    OnStart,
    OnEnd,
    #[default]
    Always,
}

impl ExecLapse {
    pub fn runs_on_start(self) -> bool {
        matches!(self, ExecLapse::OnStart | ExecLapse::Always)
    }

    pub fn runs_on_end(self) -> bool {
        matches!(self, ExecLapse::OnEnd | ExecLapse::Always)
    }
}

/// What a middleware receives.
#[derive(Debug, Clone, PartialEq)]
pub struct MiddlewareContext {
    /// The request body (on start) or the raw response (on end).
    pub data: Value,
    /// [`ExecLapse::OnStart`] or [`ExecLapse::OnEnd`], never `Always`.
    pub lapse: ExecLapse,
    /// Zero-based position of the middleware in the list being run.
    pub round: usize,
}

pub type Middleware = Arc<dyn Fn(MiddlewareContext) -> Value + Send + Sync>;

/// Wraps a closure into a [`Middleware`].
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(MiddlewareContext) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The middlewares to attach to a call.
#[derive(Clone)]
pub enum Execution {
    /// A profile registered on the connection service.
    Profile(String),
    Single(Middleware),
    Many(Vec<Middleware>),
}

impl From<&str> for Execution {
    fn from(value: &str) -> Self {
        Execution::Profile(value.to_string())
    }
}

impl From<String> for Execution {
    fn from(value: String) -> Self {
        Execution::Profile(value)
    }
}

impl From<Middleware> for Execution {
    fn from(value: Middleware) -> Self {
        Execution::Single(value)
    }
}

impl From<Vec<Middleware>> for Execution {
    fn from(value: Vec<Middleware>) -> Self {
        Execution::Many(value)
    }
}

impl Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Execution::Profile(name) => f.debug_tuple("Profile").field(name).finish(),
            Execution::Single(_) => f.write_str("Single(..)"),
            Execution::Many(list) => write!(f, "Many({} middlewares)", list.len()),
        }
    }
}

/// The before/after lists of one call site.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    before: Vec<Middleware>,
    after: Vec<Middleware>,
}

impl MiddlewareChain {
    pub fn new(before: Vec<Middleware>, after: Vec<Middleware>) -> Self {
        Self { before, after }
    }

    pub fn before(&self) -> &[Middleware] {
        &self.before
    }

    pub fn after(&self) -> &[Middleware] {
        &self.after
    }

    pub fn push_before(&mut self, middlewares: impl IntoIterator<Item = Middleware>) {
        self.before.extend(middlewares);
    }

    pub fn push_after(&mut self, middlewares: impl IntoIterator<Item = Middleware>) {
        self.after.extend(middlewares);
    }

    /// Appends `middlewares` to the lists selected by `lapse`.
    pub fn attach(&mut self, middlewares: &[Middleware], lapse: ExecLapse) {
        if lapse.runs_on_start() {
            self.push_before(middlewares.iter().cloned());
        }
        if lapse.runs_on_end() {
            self.push_after(middlewares.iter().cloned());
        }
    }

    pub fn run_before(&self, data: Value) -> Value {
        run(&self.before, data, ExecLapse::OnStart)
    }

    pub fn run_after(&self, data: Value) -> Value {
        run(&self.after, data, ExecLapse::OnEnd)
    }
}

impl Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

fn run(middlewares: &[Middleware], mut data: Value, lapse: ExecLapse) -> Value {
    for (round, middleware) in middlewares.iter().enumerate() {
        tracing::trace!(?lapse, round, "running middleware");
        data = middleware(MiddlewareContext { data, lapse, round });
    }
    data
}

/// Named middleware lists, registered separately for the two lapses.
#[derive(Clone, Default)]
pub struct Profiles {
    before: HashMap<String, Vec<Middleware>>,
    after: HashMap<String, Vec<Middleware>>,
}

impl Profiles {
    pub fn create_before(&mut self, profile: impl Into<String>, middlewares: Vec<Middleware>) {
        self.before.insert(profile.into(), middlewares);
    }

    pub fn create_after(&mut self, profile: impl Into<String>, middlewares: Vec<Middleware>) {
        self.after.insert(profile.into(), middlewares);
    }

    /// Removes the profile from both lapses.
    pub fn drop_profile(&mut self, profile: &str) {
        self.before.remove(profile);
        self.after.remove(profile);
    }

    pub fn contains(&self, profile: &str) -> bool {
        self.before.contains_key(profile) || self.after.contains_key(profile)
    }

    pub fn before(&self, profile: &str) -> &[Middleware] {
        self.before.get(profile).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn after(&self, profile: &str) -> &[Middleware] {
        self.after.get(profile).map(Vec::as_slice).unwrap_or_default()
    }

    /// A chain holding copies of the profile's lists (empty when unknown).
    pub fn chain(&self, profile: &str) -> MiddlewareChain {
        MiddlewareChain::new(self.before(profile).to_vec(), self.after(profile).to_vec())
    }
}

impl Debug for Profiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiles")
            .field("before", &self.before.keys().collect::<Vec<_>>())
            .field("after", &self.after.keys().collect::<Vec<_>>())
            .finish()
    }
}
