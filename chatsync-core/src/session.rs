//! Current-user session handle
//!
//! The auth collaborator owns sign-in; this module only tracks which user,
//! if any, is current. Every repository call reads it first and fails with
//! [`Error::Unauthenticated`] when nobody is signed in.

use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::types::UserId;

/// Shared, cheaply clonable view of the signed-in user.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    current: Arc<RwLock<Option<UserId>>>,
}

impl SessionContext {
    /// A session with nobody signed in.
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// A session already signed in as `uid`.
    pub fn signed_in(uid: UserId) -> Self {
        let session = Self::default();
        session.sign_in(uid);
        session
    }

    pub fn sign_in(&self, uid: UserId) {
        tracing::info!(uid = %uid, "Session signed in");
        if let Ok(mut current) = self.current.write() {
            *current = Some(uid);
        }
    }

    pub fn sign_out(&self) {
        tracing::info!("Session signed out");
        if let Ok(mut current) = self.current.write() {
            *current = None;
        }
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.current.read().ok().and_then(|current| current.clone())
    }

    /// The current user, or [`Error::Unauthenticated`].
    pub fn require_user(&self) -> Result<UserId> {
        self.current_user().ok_or(Error::Unauthenticated)
    }
}
