//! # Authentication
//!
//! [`AuthService`] layers the login, logout and password recovery calls on top of a
//! [`NapConnection`] and keeps track of who is logged in and what they may access.
//!
//! The authenticated flag itself lives on the connection (every response carries it);
//! the service adds the current user, the permission map and change notifications:
//!
//! * [`AuthService::subscribe_user_changed`] fires when the current user changes.
//! * [`AuthService::subscribe_resources_allowed`] follows the permission map.
//! * [`NapConnection::subscribe_authenticated`] follows the authenticated flag.
pub mod guard;

use crate::{
    client::{NapConnection, RequestError},
    http::{HttpTransport, Transport},
    types::{
        LoginIdentities, LoginOptions, NapResponse, ResetPasswordOptions, ResourcesAllowed,
    },
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{broadcast, watch};

const USER_CHANGED_CAPACITY: usize = 16;

#[derive(Serialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
enum AuthRequest<'a> {
    Logout {
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<&'a LoginOptions>,
    },
    RecoverPasswordByEmail {
        email: &'a str,
        #[serde(rename = "originUrl", skip_serializing_if = "Option::is_none")]
        origin_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<&'a ResetPasswordOptions>,
    },
    RecoverPasswordBySms {
        phone: &'a str,
    },
    CheckToken {
        token: &'a str,
    },
    SetPasswordForToken {
        token: &'a str,
        password: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<&'a LoginOptions>,
    },
    Read,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    operation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remember: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<LoginOptions>,
    #[serde(flatten)]
    identities: &'a LoginIdentities,
}

struct AuthState {
    user: RwLock<Value>,
    session_engine: RwLock<Option<String>>,
    origin_url: RwLock<Option<String>>,
    resources_allowed: watch::Sender<ResourcesAllowed>,
    user_changed: broadcast::Sender<()>,
}

/// Authentication calls and session bookkeeping. Cheap to clone; clones share state.
pub struct AuthService<T = HttpTransport> {
    conn: NapConnection<T>,
    state: Arc<AuthState>,
}

impl<T> Clone for AuthService<T> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> AuthService<T> {
    pub fn new(conn: NapConnection<T>) -> Self {
        let (resources_allowed, _) = watch::channel(ResourcesAllowed::default());
        let (user_changed, _) = broadcast::channel(USER_CHANGED_CAPACITY);
        Self {
            conn,
            state: Arc::new(AuthState {
                user: RwLock::new(Value::Object(Map::new())),
                session_engine: RwLock::new(None),
                origin_url: RwLock::new(None),
                resources_allowed,
                user_changed,
            }),
        }
    }

    pub fn connection(&self) -> &NapConnection<T> {
        &self.conn
    }

    pub fn authenticated(&self) -> bool {
        self.conn.authenticated()
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.conn.set_authenticated(authenticated);
    }

    /// Session engine the backend should use; filled into login options that lack one.
    pub fn set_session_engine(&self, engine: Option<String>) {
        *self
            .state
            .session_engine
            .write()
            .unwrap_or_else(PoisonError::into_inner) = engine;
    }

    pub fn session_engine(&self) -> Option<String> {
        self.state
            .session_engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Origin sent with password recovery requests so the backend can build links back
    /// to the application.
    pub fn set_origin_url(&self, origin: Option<String>) {
        *self
            .state
            .origin_url
            .write()
            .unwrap_or_else(PoisonError::into_inner) = origin;
    }

    pub fn origin_url(&self) -> Option<String> {
        self.state
            .origin_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn resources_allowed(&self) -> ResourcesAllowed {
        self.state.resources_allowed.borrow().clone()
    }

    /// Replaces the permission map. Subscribers are only notified when it changes.
    pub fn set_resources_allowed(&self, allowed: ResourcesAllowed) {
        self.state.resources_allowed.send_if_modified(|current| {
            if *current == allowed {
                return false;
            }
            *current = allowed;
            true
        });
    }

    pub fn subscribe_resources_allowed(&self) -> watch::Receiver<ResourcesAllowed> {
        self.state.resources_allowed.subscribe()
    }

    pub fn subscribe_user_changed(&self) -> broadcast::Receiver<()> {
        self.state.user_changed.subscribe()
    }

    /// The current user, when authenticated and known (it carries an `email`).
    pub fn user(&self) -> Option<Value> {
        if !self.authenticated() {
            return None;
        }
        let user = self.state.user.read().unwrap_or_else(PoisonError::into_inner);
        user.get("email").map(|_| user.clone())
    }

    /// Merges `data` into the current user and notifies subscribers.
    pub fn set_user(&self, data: Map<String, Value>) {
        {
            let mut user = self.state.user.write().unwrap_or_else(PoisonError::into_inner);
            match user.as_object_mut() {
                Some(current) => current.extend(data),
                None => *user = Value::Object(data),
            }
        }
        self.notify_user_changed();
    }

    fn notify_user_changed(&self) {
        // No receivers is fine.
        let _ = self.state.user_changed.send(());
    }

    fn login_options(&self, options: Option<LoginOptions>) -> Option<LoginOptions> {
        let Some(engine) = self.session_engine() else {
            return options;
        };
        let mut options = options.unwrap_or_default();
        if options.session_engine.is_none() {
            options.session_engine = Some(engine);
        }
        Some(options)
    }
}

impl<T: Transport> AuthService<T> {
    /// Refreshes the session with [`Self::read`] and reports whether it is authenticated.
    ///
    /// A failed exchange counts as not authenticated.
    pub async fn check_authenticated(&self) -> bool {
        if let Err(err) = self.read().await {
            tracing::debug!(error = %err, "session check failed");
            return false;
        }
        self.authenticated()
    }

    /// Logs in with the given identity fields (e.g. `email`, `password`).
    pub async fn login<R: DeserializeOwned>(
        &self,
        identities: &LoginIdentities,
        remember: Option<bool>,
        options: Option<LoginOptions>,
    ) -> Result<NapResponse<R>, RequestError> {
        let body = LoginRequest {
            operation: "login",
            remember,
            options: self.login_options(options),
            identities,
        };
        self.send(&body).await
    }

    pub async fn logout(&self, options: Option<LoginOptions>) -> Result<NapResponse, RequestError> {
        self.send(&AuthRequest::Logout {
            options: options.as_ref(),
        })
        .await
    }

    /// Asks the backend to email a password recovery link.
    pub async fn recover_password_by_email(
        &self,
        email: &str,
        options: Option<ResetPasswordOptions>,
    ) -> Result<NapResponse, RequestError> {
        self.send(&AuthRequest::RecoverPasswordByEmail {
            email,
            origin_url: self.origin_url(),
            options: options.as_ref(),
        })
        .await
    }

    /// Asks the backend to text a password recovery code. Not every backend supports it.
    pub async fn recover_password_by_sms(&self, phone: &str) -> Result<NapResponse, RequestError> {
        self.send(&AuthRequest::RecoverPasswordBySms { phone }).await
    }

    /// Checks a recovery token; a valid token allows [`Self::set_password_for_token`].
    pub async fn check_token(&self, token: &str) -> Result<NapResponse, RequestError> {
        self.send(&AuthRequest::CheckToken { token }).await
    }

    /// Resets the password of the token's owner, which may also log them in.
    pub async fn set_password_for_token(
        &self,
        token: &str,
        password: &str,
        options: Option<LoginOptions>,
    ) -> Result<NapResponse, RequestError> {
        self.send(&AuthRequest::SetPasswordForToken {
            token,
            password,
            options: options.as_ref(),
        })
        .await
    }

    /// Fetches the logged-in user and their permissions.
    ///
    /// On success the current user is replaced by the returned data and the permission
    /// map is updated; `user_changed` fires only if the user differs from the previous one.
    pub async fn read(&self) -> Result<NapResponse, RequestError> {
        let response: NapResponse = self.send(&AuthRequest::Read).await?;

        if response.is_success() {
            let data = response.data.clone().unwrap_or(Value::Null);
            let changed = {
                let mut user = self.state.user.write().unwrap_or_else(PoisonError::into_inner);
                let changed = *user != data;
                *user = data;
                changed
            };
            self.set_resources_allowed(response.resources_allowed.clone().unwrap_or_default());
            if changed {
                self.notify_user_changed();
            }
        }

        Ok(response)
    }

    async fn send<B: Serialize, R: DeserializeOwned>(
        &self,
        body: &B,
    ) -> Result<NapResponse<R>, RequestError> {
        let body = serde_json::to_value(body).map_err(RequestError::Encode)?;
        let response = self.conn.make_auth_request(body).await?;
        NapResponse::from_value(response).map_err(RequestError::Decode)
    }
}
