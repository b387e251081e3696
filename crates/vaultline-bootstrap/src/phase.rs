//! Observable session phases.
//!
//! The phase is what the presentation shell renders. It may lag the
//! engine's own state: while a freshly generated recovery key awaits
//! acknowledgment, engine notifications are suppressed and the phase stays
//! on [`Phase::SecretGenerated`].

/// Observable phase of a bootstrap session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Session created, not yet started.
    Idle,

    /// Waiting for transport readiness signals (bounded).
    WaitingForTransport,

    /// Engine is running; decisions are being auto-advanced.
    Working,

    /// Secret generation call is in flight.
    GeneratingSecret,

    /// A recovery key was generated and must be acknowledged before the
    /// flow continues.
    SecretGenerated,

    /// An existing secret container must be unlocked with a recovery key.
    UnlockRequired,

    /// Interactive device verification was requested as the fallback path.
    AwaitingVerification,

    /// Terminal success.
    Done,

    /// Terminal user cancellation. Not an error.
    Cancelled,

    /// Terminal failure.
    Error {
        /// Failure description for display.
        message: String,
        /// Whether a user-facing retry is offered.
        retryable: bool,
    },
}

impl Phase {
    /// Whether this phase ends the session.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Error { .. })
    }
}

/// Field-level input errors. Never escalated to a session error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    /// The recovery-key field was submitted empty.
    EmptyRecoveryKey,
    /// The supplied recovery key failed to unlock the container.
    InvalidRecoveryKey,
}
