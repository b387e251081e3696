//! External crypto-engine vocabulary.
//!
//! The engine owns the actual SSSS/cross-signing cryptography and reports
//! its bootstrap progress through a fixed vocabulary of states, with one
//! transition method per decision state. The orchestrator consumes the
//! states and answers via the transitions; it never reimplements the
//! engine's cryptography (the backup trust signature is the one exception,
//! and it lives in the bootstrap crate).

use async_trait::async_trait;
use thiserror::Error;

use crate::secret::RecoveryKey;
use crate::sync::EventRef;

/// States reported by the external engine during bootstrap.
///
/// Fourteen states; the orchestrator's decision table maps each to either a
/// silent transition call or an observable pause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapState {
    /// Engine constructed, bootstrap not yet running.
    Idle,

    /// Confirm destructive wipe of an existing secret-storage container.
    ConfirmWipeSecretStorage,

    /// Confirm destructive wipe of an existing cross-signing identity.
    ConfirmWipeCrossSigning,

    /// Confirm which cross-signing subkeys to establish.
    ConfirmCrossSigningSubkeys,

    /// Confirm destructive wipe of an existing online key backup.
    ConfirmWipeKeyBackup,

    /// Confirm establishing a new online key backup.
    ConfirmCreateKeyBackup,

    /// Malformed legacy secrets were found; confirm ignoring them.
    IgnoreMalformedSecrets,

    /// Choose between reusing the existing secret-storage container and
    /// creating a new one.
    UseExistingSecretStorage,

    /// Secrets exist in a superseded container; confirm migration.
    MigrateLegacySecretStorage,

    /// A new secret-storage container is being created; a recovery key must
    /// be generated and acknowledged.
    GenerateNewSecretStorage,

    /// An existing secret-storage container must be unlocked.
    OpenExistingSecretStorage,

    /// A server step-up authentication challenge is blocking progress.
    AuthenticationRequired {
        /// Server-issued challenge session token.
        session: String,
    },

    /// Terminal success.
    Done,

    /// Terminal failure.
    Error {
        /// Engine-reported failure description.
        message: String,
    },
}

/// Secret classes the engine caches locally once known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretClass {
    /// The online key-backup decryption secret.
    KeyBackup,
    /// The master cross-signing key.
    CrossSigningMaster,
    /// The self-signing cross-signing subkey.
    CrossSigningSelfSigning,
    /// The user-signing cross-signing subkey.
    CrossSigningUserSigning,
}

impl SecretClass {
    /// All secret classes, in no particular order.
    pub const ALL: [Self; 4] = [
        Self::KeyBackup,
        Self::CrossSigningMaster,
        Self::CrossSigningSelfSigning,
        Self::CrossSigningUserSigning,
    ];
}

/// Which cross-signing subkeys to establish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubkeySelection {
    /// Establish the master key.
    pub master: bool,
    /// Establish the self-signing subkey.
    pub self_signing: bool,
    /// Establish the user-signing subkey.
    pub user_signing: bool,
}

impl SubkeySelection {
    /// Establish the full key hierarchy.
    pub const fn all() -> Self {
        Self { master: true, self_signing: true, user_signing: true }
    }
}

/// Errors reported by the external engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The supplied recovery key failed to unlock the container.
    ///
    /// Field-level: the user may correct the input and retry.
    #[error("recovery key did not unlock the secret container")]
    InvalidRecoveryKey,

    /// Secret generation failed; the container may be half-configured and
    /// only a full restart is safe.
    #[error("secret generation failed: {0}")]
    GenerationFailed(String),

    /// A transition call was rejected or failed inside the engine.
    #[error("engine transition failed: {0}")]
    TransitionFailed(String),

    /// The requested key material is not available.
    #[error("key material unavailable: {0}")]
    MissingKeyMaterial(String),
}

/// The external cryptography/protocol engine, as consumed by the
/// orchestrator.
///
/// Implementations push [`BootstrapState`] notifications to the host, which
/// forwards them to the session's decision function. Each transition method
/// answers exactly one decision state.
#[async_trait]
pub trait CryptoEngine: Send + Sync {
    /// Begin the bootstrap flow; the engine starts reporting states.
    async fn start(&self) -> Result<(), EngineError>;

    /// Answer [`BootstrapState::ConfirmWipeSecretStorage`].
    async fn wipe_secret_storage(&self, wipe: bool) -> Result<(), EngineError>;

    /// Answer [`BootstrapState::ConfirmWipeCrossSigning`].
    async fn wipe_cross_signing(&self, wipe: bool) -> Result<(), EngineError>;

    /// Answer [`BootstrapState::ConfirmCrossSigningSubkeys`].
    async fn establish_subkeys(&self, subkeys: SubkeySelection) -> Result<(), EngineError>;

    /// Answer [`BootstrapState::ConfirmWipeKeyBackup`].
    async fn wipe_key_backup(&self, wipe: bool) -> Result<(), EngineError>;

    /// Answer [`BootstrapState::ConfirmCreateKeyBackup`].
    async fn establish_key_backup(&self, create: bool) -> Result<(), EngineError>;

    /// Answer [`BootstrapState::IgnoreMalformedSecrets`].
    async fn ignore_malformed_secrets(&self, ignore: bool) -> Result<(), EngineError>;

    /// Answer [`BootstrapState::UseExistingSecretStorage`].
    async fn use_existing_secret_storage(&self, reuse: bool) -> Result<(), EngineError>;

    /// Answer [`BootstrapState::MigrateLegacySecretStorage`].
    async fn migrate_legacy_secrets(&self, migrate: bool) -> Result<(), EngineError>;

    /// Create the new secret container and return its recovery key.
    ///
    /// This call may trigger nested state transitions as a side effect while
    /// the engine performs the secret-sharing setup.
    async fn generate_secret_storage(&self) -> Result<RecoveryKey, EngineError>;

    /// Answer [`BootstrapState::OpenExistingSecretStorage`] once the
    /// container has been unlocked.
    async fn open_secret_storage(&self) -> Result<(), EngineError>;

    /// Attempt a cryptographic unlock of the existing container.
    async fn unlock_secret_storage(&self, key: &RecoveryKey) -> Result<(), EngineError>;

    /// Sign this device with the cross-signing identity.
    ///
    /// `key` carries the just-unlocked recovery key; `None` signs from
    /// already-cached secrets. Idempotent.
    async fn self_sign_device(&self, key: Option<&RecoveryKey>) -> Result<(), EngineError>;

    /// Cache every secret class that is currently obtainable. Idempotent.
    async fn cache_all_secrets(&self) -> Result<(), EngineError>;

    /// Whether a secret class is cached locally.
    async fn is_cached(&self, class: SecretClass) -> bool;

    /// Export the private master cross-signing key from the unlocked
    /// container, for the backup trust signature.
    async fn export_master_seed(&self) -> Result<[u8; 32], EngineError>;

    /// Issue a key re-request for an undecryptable message.
    async fn request_room_key(&self, event: &EventRef) -> Result<(), EngineError>;
}
