//! Authentication state consumed by the archive
//!
//! The archive never signs anyone in or out. It only asks an
//! [`AuthProvider`] who the current principal is and subscribes to changes
//! of that answer. [`SessionAuth`] is the in-process implementation used by
//! the CLI (seeded from configuration) and by tests.

use crate::config::AuthConfig;
use tokio::sync::watch;

/// An authenticated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Stable user identifier; used as the transcript owner id
    pub id: String,
    /// Email address, if known
    pub email: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
        }
    }
}

/// Source of the current principal
///
/// Implementations must be cheap to query; stores call
/// [`current_principal`](AuthProvider::current_principal) on every
/// operation.
pub trait AuthProvider: Send + Sync {
    /// The signed-in principal, or `None` when anonymous
    fn current_principal(&self) -> Option<Principal>;

    /// Receiver that observes every auth-state change
    ///
    /// The receiver's current value is the present state.
    fn subscribe(&self) -> watch::Receiver<Option<Principal>>;
}

/// In-process authentication state
///
/// # Examples
///
/// ```
/// use medibot::auth::{AuthProvider, Principal, SessionAuth};
///
/// let auth = SessionAuth::anonymous();
/// assert!(auth.current_principal().is_none());
///
/// auth.sign_in(Principal::new("user-1", None));
/// assert_eq!(auth.current_principal().unwrap().id, "user-1");
/// ```
#[derive(Debug)]
pub struct SessionAuth {
    state: watch::Sender<Option<Principal>>,
}

impl SessionAuth {
    /// Start with nobody signed in
    pub fn anonymous() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// Start with the given principal signed in
    pub fn signed_in(principal: Principal) -> Self {
        let (state, _) = watch::channel(Some(principal));
        Self { state }
    }

    /// Build from the `auth` config section
    ///
    /// A blank or missing `user_id` yields an anonymous session.
    pub fn from_config(config: &AuthConfig) -> Self {
        match config.user_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                Self::signed_in(Principal::new(id, config.email.clone()))
            }
            _ => Self::anonymous(),
        }
    }

    /// Replace the current principal and notify subscribers
    pub fn sign_in(&self, principal: Principal) {
        tracing::debug!("Principal signed in: {}", principal.id);
        self.state.send_replace(Some(principal));
    }

    /// Clear the current principal and notify subscribers
    pub fn sign_out(&self) {
        tracing::debug!("Principal signed out");
        self.state.send_replace(None);
    }
}

impl AuthProvider for SessionAuth {
    fn current_principal(&self) -> Option<Principal> {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
        self.state.subscribe()
    }
}
