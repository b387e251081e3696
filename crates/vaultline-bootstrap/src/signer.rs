//! Key-backup trust signer.
//!
//! Once the secret container is unlocked, the backup descriptor gets signed
//! with two distinct keys over the same canonical bytes: the device's
//! identity key and the account's master cross-signing key. Other clients
//! then trust the backup without re-verifying this device. The external
//! engine does not perform this step, so it is implemented here.

use ed25519_dalek::SigningKey;
use thiserror::Error;
use vaultline_core::canonical::{self, CanonicalJsonError};
use vaultline_core::{BackupError, BackupService, CryptoEngine, DeviceIdentity, EngineError, master_key_id};

/// Errors from the trust-signing sequence.
///
/// All of these are non-fatal for the session: the backup stays functional,
/// it just won't be recognized as verified by other clients yet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrustSignError {
    /// The server reported no backup version to sign.
    #[error("no backup descriptor to sign")]
    NoBackup,

    /// Fetching the current descriptor failed.
    #[error("descriptor fetch failed: {0}")]
    Fetch(BackupError),

    /// The payload could not be canonicalized or signed.
    #[error("canonicalization failed: {0}")]
    Canonical(#[from] CanonicalJsonError),

    /// The master key material could not be exported from the container.
    #[error("master key unavailable: {0}")]
    MasterKey(EngineError),

    /// Republishing the signed descriptor failed.
    #[error("descriptor publish failed: {0}")]
    Publish(BackupError),
}

/// Sign the current backup descriptor with the device and master keys and
/// republish it.
///
/// Re-fetches the descriptor from the server first: a wipe/recreate earlier
/// in the session may have changed the version. Both signatures cover the
/// same canonical serialization of the auth payload with `signatures` and
/// `unsigned` stripped.
pub async fn sign_and_republish(
    identity: &DeviceIdentity,
    engine: &dyn CryptoEngine,
    backup: &dyn BackupService,
) -> Result<(), TrustSignError> {
    let mut descriptor = backup
        .fetch_current()
        .await
        .map_err(TrustSignError::Fetch)?
        .ok_or(TrustSignError::NoBackup)?;

    let payload = descriptor.signable_payload();

    let device_signature = canonical::sign_json(&identity.device_key, &payload)?;
    descriptor.attach_signature(&identity.user_id, identity.device_key_id(), device_signature);

    let master_seed =
        engine.export_master_seed().await.map_err(TrustSignError::MasterKey)?;
    let master_key = SigningKey::from_bytes(&master_seed);
    let master_signature = canonical::sign_json(&master_key, &payload)?;
    let master_public = canonical::encode_public_key(&master_key.verifying_key());
    descriptor.attach_signature(&identity.user_id, master_key_id(&master_public), master_signature);

    tracing::debug!(
        version = %descriptor.version,
        "republishing trust-signed backup descriptor"
    );
    backup.publish(&descriptor).await.map_err(TrustSignError::Publish)
}
