//! Transport readiness and room scanning.

use async_trait::async_trait;

/// Readiness signals from the transport-level client.
///
/// Bootstrap must not start before the client has a usable view of the
/// account: room list, account data, the device-key table, and at least one
/// completed sync cycle.
pub trait SyncGate: Send + Sync {
    /// Room list loaded.
    fn rooms_loaded(&self) -> bool;

    /// Account data loaded.
    fn account_data_loaded(&self) -> bool;

    /// Device-key table loaded.
    fn device_keys_loaded(&self) -> bool;

    /// At least one sync cycle has completed.
    fn has_synced(&self) -> bool;

    /// All readiness signals present.
    fn is_ready(&self) -> bool {
        self.rooms_loaded()
            && self.account_data_loaded()
            && self.device_keys_loaded()
            && self.has_synced()
    }
}

/// Reference to a message event, for key re-requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventRef {
    /// Conversation the message belongs to.
    pub room_id: String,
    /// Event identifier within the conversation.
    pub event_id: String,
}

/// Scans known conversations for messages that failed to decrypt and are
/// flagged re-request-permitted.
#[async_trait]
pub trait RoomScanner: Send + Sync {
    /// All undecryptable, re-requestable message events.
    async fn undecryptable_events(&self) -> Vec<EventRef>;
}
