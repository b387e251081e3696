//! State-to-decision dispatch table.
//!
//! Every engine state maps to exactly one [`Decision`]. Keeping the mapping
//! total and data-driven means new engine states extend the table instead
//! of restructuring control flow.
//!
//! Six decision states are answered silently and never surface to the UI:
//! the wipe confirmations take the session's wipe intent verbatim (backup
//! wipe after a server probe), subkey selection always establishes the full
//! hierarchy, and malformed legacy secrets are always ignored. Two more are
//! auto-advanced because neither choice is one an end user can meaningfully
//! make: container reuse follows `!wipe_intent`, and legacy migration is
//! always skipped.

use vaultline_core::{BootstrapState, SubkeySelection};

/// A silent engine transition with its computed argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCall {
    /// Answer the secret-container wipe confirmation.
    WipeSecretStorage(bool),
    /// Answer the cross-signing wipe confirmation.
    WipeCrossSigning(bool),
    /// Answer the subkey selection.
    EstablishSubkeys(SubkeySelection),
    /// Answer the key-backup wipe confirmation.
    WipeKeyBackup(bool),
    /// Answer the create-key-backup confirmation.
    EstablishKeyBackup(bool),
    /// Answer the malformed-legacy-secrets prompt.
    IgnoreMalformedSecrets(bool),
    /// Answer the reuse-existing-container choice.
    UseExistingSecretStorage(bool),
    /// Answer the legacy-migration prompt.
    MigrateLegacySecrets(bool),
}

/// What the session does with a reported engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Invoke an engine transition immediately, without surfacing the state.
    Advance(EngineCall),

    /// Probe the server for an existing backup, then answer the backup-wipe
    /// confirmation: not-found forces `true` regardless of `requested`,
    /// because "no backup" must be treated as "must create".
    AdvanceAfterBackupProbe {
        /// The session's wipe intent.
        requested: bool,
    },

    /// Enter the secret-generation flow.
    Generate,

    /// Enter the unlock-existing-container flow.
    Unlock,

    /// A step-up authentication challenge is pending; the relay handles it.
    AwaitAuthentication,

    /// Terminal success; run finalization.
    Complete,

    /// Terminal engine failure.
    Fail {
        /// Engine-reported failure description.
        message: String,
    },

    /// Nothing to do for this state.
    Ignore,
}

/// The decision function: maps a reported engine state to a decision.
pub fn decide(state: &BootstrapState, wipe_intent: bool) -> Decision {
    match state {
        BootstrapState::Idle => Decision::Ignore,
        BootstrapState::ConfirmWipeSecretStorage => {
            Decision::Advance(EngineCall::WipeSecretStorage(wipe_intent))
        },
        BootstrapState::ConfirmWipeCrossSigning => {
            Decision::Advance(EngineCall::WipeCrossSigning(wipe_intent))
        },
        BootstrapState::ConfirmCrossSigningSubkeys => {
            Decision::Advance(EngineCall::EstablishSubkeys(SubkeySelection::all()))
        },
        BootstrapState::ConfirmWipeKeyBackup => {
            Decision::AdvanceAfterBackupProbe { requested: wipe_intent }
        },
        BootstrapState::ConfirmCreateKeyBackup => {
            Decision::Advance(EngineCall::EstablishKeyBackup(true))
        },
        BootstrapState::IgnoreMalformedSecrets => {
            Decision::Advance(EngineCall::IgnoreMalformedSecrets(true))
        },
        BootstrapState::UseExistingSecretStorage => {
            Decision::Advance(EngineCall::UseExistingSecretStorage(!wipe_intent))
        },
        BootstrapState::MigrateLegacySecretStorage => {
            Decision::Advance(EngineCall::MigrateLegacySecrets(false))
        },
        BootstrapState::GenerateNewSecretStorage => Decision::Generate,
        BootstrapState::OpenExistingSecretStorage => Decision::Unlock,
        BootstrapState::AuthenticationRequired { .. } => Decision::AwaitAuthentication,
        BootstrapState::Done => Decision::Complete,
        BootstrapState::Error { message } => Decision::Fail { message: message.clone() },
    }
}
