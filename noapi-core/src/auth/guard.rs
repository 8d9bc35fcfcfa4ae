//! # Route Guard
//!
//! [`AuthGuard`] protects the private area of an application. It is router agnostic: the
//! embedding UI supplies a [`Navigator`] and calls [`AuthGuard::can_activate`] /
//! [`AuthGuard::can_deactivate`] from its own route lifecycle hooks.
//!
//! While a private route is active the guard watches the connection's authenticated flag
//! and sends the user back to the login page as soon as the session is lost.
use super::AuthService;
use crate::http::{HttpTransport, Transport};
use futures_util::StreamExt;
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Query parameter carrying the location to come back to after logging in.
pub const NEXT_PARAM: &str = "_next";

/// The application's router, as seen by the guard.
pub trait Navigator: Send + Sync + 'static {
    /// Navigates to `url` with the given query parameters.
    fn navigate_by_url(&self, url: &str, query: &[(&str, &str)]);

    /// The current location without its origin (`/orders/12?tab=items`).
    fn current_url(&self) -> String;
}

pub struct AuthGuard<N, T = HttpTransport> {
    navigator: Arc<N>,
    auth: AuthService<T>,
    login_path: String,
    in_private_mode: Arc<AtomicBool>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl<N: Navigator, T> AuthGuard<N, T> {
    pub fn new(navigator: Arc<N>, auth: AuthService<T>) -> Self {
        Self {
            navigator,
            auth,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            in_private_mode: Arc::new(AtomicBool::new(false)),
            subscription: Mutex::new(None),
        }
    }

    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn in_private_mode(&self) -> bool {
        self.in_private_mode.load(Ordering::SeqCst)
    }

    /// Sends the user to `login_path` (or the configured one), remembering where they were.
    pub fn redirect_to_login(&self, login_path: Option<&str>) {
        redirect_to_login(
            self.navigator.as_ref(),
            login_path.unwrap_or(&self.login_path),
        );
    }

    /// Leaves the login page for `path` (`/` by default).
    pub fn redirect_from_login(&self, path: Option<&str>) {
        self.navigator.navigate_by_url(path.unwrap_or("/"), &[]);
    }

    /// Leaves the private area: stops watching the session and always allows the exit.
    pub fn can_deactivate(&self) -> bool {
        self.stop_watching();
        self.in_private_mode.store(false, Ordering::SeqCst);
        true
    }

    fn stop_watching(&self) {
        let handle = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl<N: Navigator, T: Transport + 'static> AuthGuard<N, T> {
    /// Decides whether a private route may be entered.
    ///
    /// Unauthenticated users are redirected to the login page. Authenticated users are
    /// let through and the session is watched until [`Self::can_deactivate`].
    pub async fn can_activate(&self) -> bool {
        self.in_private_mode.store(true, Ordering::SeqCst);

        let authenticated = self.auth.check_authenticated().await;
        if authenticated {
            self.watch_session();
        } else {
            self.redirect_to_login(None);
        }

        self.in_private_mode.store(authenticated, Ordering::SeqCst);
        authenticated
    }

    fn watch_session(&self) {
        let mut changes =
            WatchStream::from_changes(self.auth.connection().subscribe_authenticated());
        let navigator = Arc::clone(&self.navigator);
        let in_private_mode = Arc::clone(&self.in_private_mode);
        let login_path = self.login_path.clone();

        let handle = tokio::spawn(async move {
            while let Some(authenticated) = changes.next().await {
                if !authenticated {
                    tracing::debug!("session lost, redirecting to login");
                    redirect_to_login(navigator.as_ref(), &login_path);
                } else if !in_private_mode.load(Ordering::SeqCst) {
                    navigator.navigate_by_url("/", &[]);
                }
            }
        });

        let previous = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

impl<N, T> Drop for AuthGuard<N, T> {
    fn drop(&mut self) {
        let handle = self
            .subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

fn redirect_to_login<N: Navigator + ?Sized>(navigator: &N, login_path: &str) {
    let next = navigator.current_url();
    if next.is_empty() {
        navigator.navigate_by_url(login_path, &[]);
    } else {
        navigator.navigate_by_url(login_path, &[(NEXT_PARAM, next.as_str())]);
    }
}
