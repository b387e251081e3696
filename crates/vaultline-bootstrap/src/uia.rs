//! Step-up authentication challenge relay.
//!
//! Sensitive server operations issued mid-bootstrap (uploading cross-signing
//! keys) can come back with a step-up authentication challenge. The relay
//! parks the challenge, lets the presentation shell resolve or cancel it,
//! and caches the credential so repeated challenges within one session do
//! not re-prompt. Challenges never outlive the session.

use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;

/// How a parked challenge was completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiaOutcome {
    /// The user supplied the account credential.
    Resolved(String),
    /// The user declined the challenge.
    Cancelled,
}

struct PendingChallenge {
    session: String,
    responder: oneshot::Sender<UiaOutcome>,
}

/// Relay between the transport layer's challenge notifications and the
/// presentation shell.
#[derive(Default)]
pub struct UiaRelay {
    pending: Mutex<Option<PendingChallenge>>,
    cached: Mutex<Option<String>>,
}

impl UiaRelay {
    /// Create an empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a server-issued challenge and return its completion handle.
    ///
    /// When a credential is already cached from an earlier challenge in
    /// this session, the challenge resolves immediately without surfacing.
    /// A previously parked, unanswered challenge is completed with
    /// [`UiaOutcome::Cancelled`] before being replaced.
    pub fn challenge(&self, session: impl Into<String>) -> oneshot::Receiver<UiaOutcome> {
        let (responder, receiver) = oneshot::channel();

        let cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(credential) = cached {
            let _ = responder.send(UiaOutcome::Resolved(credential));
            return receiver;
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) =
            pending.replace(PendingChallenge { session: session.into(), responder })
        {
            let _ = previous.responder.send(UiaOutcome::Cancelled);
        }
        receiver
    }

    /// Session token of the parked challenge, if one is waiting.
    pub fn pending_session(&self) -> Option<String> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.session.clone())
    }

    /// Resolve the parked challenge with the account credential.
    ///
    /// The credential is cached for later challenges in the same session.
    /// Returns false if no challenge was waiting.
    pub fn resolve(&self, credential: impl Into<String>) -> bool {
        let credential = credential.into();
        {
            let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
            *cached = Some(credential.clone());
        }

        let taken = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        match taken {
            Some(challenge) => challenge.responder.send(UiaOutcome::Resolved(credential)).is_ok(),
            None => false,
        }
    }

    /// Cancel the parked challenge. Returns false if none was waiting.
    pub fn cancel(&self) -> bool {
        let taken = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        match taken {
            Some(challenge) => challenge.responder.send(UiaOutcome::Cancelled).is_ok(),
            None => false,
        }
    }

    /// Forget the cached credential. Called at session completion.
    pub fn clear_cached(&self) {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        *cached = None;
    }
}
