//! Backup server surface.

use async_trait::async_trait;
use thiserror::Error;

use crate::descriptor::BackupDescriptor;

/// Errors from the backup server surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackupError {
    /// No backup version exists on the server.
    #[error("no backup version exists")]
    NotFound,

    /// The server rejected the request.
    #[error("backup request rejected: {0}")]
    Rejected(String),

    /// Transport-level failure talking to the server.
    #[error("backup transport failure: {0}")]
    Transport(String),
}

/// Server operations on the online key backup.
#[async_trait]
pub trait BackupService: Send + Sync {
    /// Fetch the current backup descriptor.
    ///
    /// Implementations MUST hit the server rather than a local cache: a
    /// wipe/recreate earlier in the session may have changed the version.
    /// Returns `Ok(None)` when the server reports no backup.
    async fn fetch_current(&self) -> Result<Option<BackupDescriptor>, BackupError>;

    /// Publish an updated descriptor under its own version and algorithm.
    async fn publish(&self, descriptor: &BackupDescriptor) -> Result<(), BackupError>;

    /// Load all keys from the online backup. Returns the number imported.
    async fn restore_all(&self) -> Result<usize, BackupError>;
}
