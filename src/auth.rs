//! Authentication collaborator for the sync orchestrator.
//!
//! Sync only needs to know whether a user is logged in and which bearer
//! token to send; obtaining the token is out of this crate's hands.

use std::sync::{PoisonError, RwLock};

pub trait AuthProvider: Send + Sync {
    fn is_logged_in(&self) -> bool;

    /// Bearer token for the remote store, `None` when logged out.
    fn token(&self) -> Option<String>;

    /// Token to use right now, or `None` when sync is disabled.
    fn sync_token(&self) -> Option<String> {
        if !self.is_logged_in() {
            return None;
        }
        self.token().filter(|t| !t.trim().is_empty())
    }
}

/// In-process session holding at most one token.
#[derive(Debug, Default)]
pub struct SessionAuth {
    token: RwLock<Option<String>>,
}

impl SessionAuth {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token.filter(|t| !t.trim().is_empty())),
        }
    }

    pub fn login(&self, token: impl Into<String>) {
        let token = token.into();
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        tracing::info!("Session logged in");
    }

    pub fn logout(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::info!("Session logged out");
    }
}

impl AuthProvider for SessionAuth {
    fn is_logged_in(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// `Authorization` header value for a token.
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
