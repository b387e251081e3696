//! Vaultline core
//!
//! Shared vocabulary for the Vaultline encryption-bootstrap orchestrator.
//! This crate defines the seams between the orchestration state machine and
//! its external collaborators, plus the one piece of cryptography the
//! orchestrator performs itself: canonical-JSON signing of the key-backup
//! descriptor.
//!
//! # Components
//!
//! - [`CryptoEngine`]: the external crypto/protocol engine, as a trait
//! - [`SecretStore`]: on-device persistence for the recovery key
//! - [`BackupService`]: server surface for the online key backup
//! - [`SyncGate`] / [`RoomScanner`]: transport readiness and re-request scan
//! - [`BackupDescriptor`]: the server-held backup record and its signatures
//! - [`canonical`]: canonical JSON bytes + ed25519 sign/verify over them
//! - [`Environment`]: time abstraction for deterministic tests

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod canonical;
mod backup;
mod descriptor;
mod engine;
pub mod env;
mod identity;
mod secret;
mod store;
mod sync;

pub use backup::{BackupError, BackupService};
pub use descriptor::BackupDescriptor;
pub use engine::{BootstrapState, CryptoEngine, EngineError, SecretClass, SubkeySelection};
pub use env::Environment;
pub use identity::{DeviceIdentity, master_key_id};
pub use secret::RecoveryKey;
pub use store::{SecretStore, StoreError};
pub use sync::{EventRef, RoomScanner, SyncGate};
