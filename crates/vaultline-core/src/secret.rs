//! Recovery-key material.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// A human-manageable recovery key for the secret-storage container.
///
/// The raw material is sensitive: it unlocks cross-signing and backup
/// secrets. The `Debug` impl redacts it and the buffer is zeroed on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RecoveryKey(String);

impl RecoveryKey {
    /// Wrap recovery-key material.
    pub fn new(material: impl Into<String>) -> Self {
        Self(material.into())
    }

    /// The raw key string, for display to the user or submission to the
    /// engine. Callers must not log the returned value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True if the key holds no material.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for RecoveryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RecoveryKey(..)")
    }
}

impl From<&str> for RecoveryKey {
    fn from(material: &str) -> Self {
        Self::new(material)
    }
}
