//! Session collaborator.
//!
//! Starting an audit requires a signed-in user. Session changes are
//! broadcast over a `watch` channel so a running attempt can be torn down
//! when the user signs out.

use tokio::sync::watch;

use crate::error::SessionError;

pub trait SessionProvider {
    /// Signed-in user, if any.
    fn current_user(&self) -> Option<String>;

    fn sign_out(&self) -> Result<(), SessionError>;

    /// Receiver that observes every session change.
    fn subscribe(&self) -> watch::Receiver<Option<String>>;

    fn require_user(&self) -> Result<String, SessionError> {
        self.current_user().ok_or(SessionError::NotSignedIn)
    }
}

/// In-process session backed by a watch channel.
#[derive(Debug)]
pub struct LocalSession {
    tx: watch::Sender<Option<String>>,
}

impl LocalSession {
    pub fn signed_out() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn signed_in(user: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(Some(user.into()));
        Self { tx }
    }

    pub fn sign_in(&self, user: impl Into<String>) {
        let user = user.into();
        tracing::debug!(user = %user, "signed in");
        self.tx.send_replace(Some(user));
    }
}

impl SessionProvider for LocalSession {
    fn current_user(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    fn sign_out(&self) -> Result<(), SessionError> {
        if self.tx.borrow().is_none() {
            return Err(SessionError::NotSignedIn);
        }
        self.tx.send_replace(None);
        tracing::debug!("signed out");
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}
