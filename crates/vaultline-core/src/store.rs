//! Secret lifecycle store.

use async_trait::async_trait;
use thiserror::Error;

use crate::secret::RecoveryKey;

/// Errors from the on-device secret store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The platform keystore rejected the operation.
    #[error("keystore rejected operation: {0}")]
    Rejected(String),

    /// The backing store is unavailable.
    #[error("keystore unavailable: {0}")]
    Unavailable(String),
}

/// Persists the recovery key on the local device, outside process memory.
///
/// Backed by a platform secure-credential store in production. The
/// orchestrator writes only when the user opted in to saving the key.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Previously stored recovery key, if any.
    async fn get(&self) -> Result<Option<RecoveryKey>, StoreError>;

    /// Persist the recovery key, replacing any previous value.
    async fn put(&self, key: &RecoveryKey) -> Result<(), StoreError>;
}
