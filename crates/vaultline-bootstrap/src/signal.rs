//! Pending UI actions.

/// A signal the presentation shell must act on.
///
/// At most one is outstanding per session; it is consumed exactly once via
/// [`crate::BootstrapSession::take_ui_signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiSignal {
    /// Run an interactive verification flow with another trusted device.
    StartVerification,

    /// Confirm cancelling while a freshly generated, unacknowledged
    /// recovery key would be lost.
    ConfirmKeyLoss,

    /// Confirm cancelling while an unlocked-but-unsaved recovery key is in
    /// flight.
    ConfirmCancel,

    /// The session completed successfully.
    Complete,
}
