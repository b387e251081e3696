//! Account and device identity used for trust signing.

use ed25519_dalek::SigningKey;

/// The identity material the trust signer signs with.
#[derive(Debug)]
pub struct DeviceIdentity {
    /// Fully-qualified account identifier.
    pub user_id: String,

    /// This device's identifier.
    pub device_id: String,

    /// This device's ed25519 identity signing key.
    pub device_key: SigningKey,
}

impl DeviceIdentity {
    /// Create an identity record.
    pub fn new(user_id: impl Into<String>, device_id: impl Into<String>, device_key: SigningKey) -> Self {
        Self { user_id: user_id.into(), device_id: device_id.into(), device_key }
    }

    /// Signature key identifier for the device key (`ed25519:<device-id>`).
    pub fn device_key_id(&self) -> String {
        format!("ed25519:{}", self.device_id)
    }
}

/// Signature key identifier for a master key, from its unpadded-base64
/// public part.
pub fn master_key_id(master_public_b64: &str) -> String {
    format!("ed25519:{master_public_b64}")
}
