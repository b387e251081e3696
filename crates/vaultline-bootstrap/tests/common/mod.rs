//! Recording fakes for bootstrap integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use vaultline_bootstrap::{BootstrapSession, SessionConfig, UiaRelay};
use vaultline_core::env::test_utils::MockEnv;
use vaultline_core::{
    BackupDescriptor, BackupError, BackupService, CryptoEngine, DeviceIdentity, EngineError,
    EventRef, RecoveryKey, RoomScanner, SecretClass, SecretStore, StoreError, SubkeySelection,
    SyncGate,
};

pub const GENERATED_KEY: &str = "ABCD-1234-EFGH";
pub const USER_ID: &str = "@alice:example.org";
pub const DEVICE_ID: &str = "DEVICEID";
pub const DEVICE_SEED: [u8; 32] = [1u8; 32];
pub const MASTER_SEED: [u8; 32] = [9u8; 32];

/// Engine fake recording every call by name and argument.
#[derive(Default)]
pub struct RecordingEngine {
    pub calls: Mutex<Vec<String>>,
    /// Recovery key accepted by `unlock_secret_storage`. `None` rejects all.
    pub accepted_key: Option<String>,
    /// Fail `generate_secret_storage`.
    pub generate_fails: bool,
    /// Secret classes reported as cached.
    pub cached: Mutex<Vec<SecretClass>>,
}

impl RecordingEngine {
    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn called(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }

    pub fn mark_all_cached(&self) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = SecretClass::ALL.to_vec();
    }
}

#[async_trait]
impl CryptoEngine for RecordingEngine {
    async fn start(&self) -> Result<(), EngineError> {
        self.record("start");
        Ok(())
    }
    async fn wipe_secret_storage(&self, wipe: bool) -> Result<(), EngineError> {
        self.record(format!("wipe_secret_storage({wipe})"));
        Ok(())
    }
    async fn wipe_cross_signing(&self, wipe: bool) -> Result<(), EngineError> {
        self.record(format!("wipe_cross_signing({wipe})"));
        Ok(())
    }
    async fn establish_subkeys(&self, subkeys: SubkeySelection) -> Result<(), EngineError> {
        self.record(format!(
            "establish_subkeys({},{},{})",
            subkeys.master, subkeys.self_signing, subkeys.user_signing
        ));
        Ok(())
    }
    async fn wipe_key_backup(&self, wipe: bool) -> Result<(), EngineError> {
        self.record(format!("wipe_key_backup({wipe})"));
        Ok(())
    }
    async fn establish_key_backup(&self, create: bool) -> Result<(), EngineError> {
        self.record(format!("establish_key_backup({create})"));
        Ok(())
    }
    async fn ignore_malformed_secrets(&self, ignore: bool) -> Result<(), EngineError> {
        self.record(format!("ignore_malformed_secrets({ignore})"));
        Ok(())
    }
    async fn use_existing_secret_storage(&self, reuse: bool) -> Result<(), EngineError> {
        self.record(format!("use_existing_secret_storage({reuse})"));
        Ok(())
    }
    async fn migrate_legacy_secrets(&self, migrate: bool) -> Result<(), EngineError> {
        self.record(format!("migrate_legacy_secrets({migrate})"));
        Ok(())
    }
    async fn generate_secret_storage(&self) -> Result<RecoveryKey, EngineError> {
        self.record("generate_secret_storage");
        if self.generate_fails {
            Err(EngineError::GenerationFailed("entropy source failed".into()))
        } else {
            Ok(RecoveryKey::new(GENERATED_KEY))
        }
    }
    async fn open_secret_storage(&self) -> Result<(), EngineError> {
        self.record("open_secret_storage");
        Ok(())
    }
    async fn unlock_secret_storage(&self, key: &RecoveryKey) -> Result<(), EngineError> {
        self.record("unlock_secret_storage");
        match &self.accepted_key {
            Some(accepted) if accepted == key.expose() => {
                self.mark_all_cached();
                Ok(())
            },
            _ => Err(EngineError::InvalidRecoveryKey),
        }
    }
    async fn self_sign_device(&self, key: Option<&RecoveryKey>) -> Result<(), EngineError> {
        self.record(format!("self_sign_device(with_key={})", key.is_some()));
        Ok(())
    }
    async fn cache_all_secrets(&self) -> Result<(), EngineError> {
        self.record("cache_all_secrets");
        Ok(())
    }
    async fn is_cached(&self, class: SecretClass) -> bool {
        self.cached.lock().unwrap_or_else(|e| e.into_inner()).contains(&class)
    }
    async fn export_master_seed(&self) -> Result<[u8; 32], EngineError> {
        self.record("export_master_seed");
        Ok(MASTER_SEED)
    }
    async fn request_room_key(&self, event: &EventRef) -> Result<(), EngineError> {
        self.record(format!("request_room_key({}/{})", event.room_id, event.event_id));
        Ok(())
    }
}

/// In-memory secret store recording puts.
#[derive(Default)]
pub struct MemoryStore {
    stored: Mutex<Option<RecoveryKey>>,
    puts: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn with_stored(key: &str) -> Self {
        Self { stored: Mutex::new(Some(RecoveryKey::new(key))), puts: Mutex::new(Vec::new()) }
    }

    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self) -> Result<Option<RecoveryKey>, StoreError> {
        Ok(self.stored.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
    async fn put(&self, key: &RecoveryKey) -> Result<(), StoreError> {
        self.puts.lock().unwrap_or_else(|e| e.into_inner()).push(key.expose().to_owned());
        *self.stored.lock().unwrap_or_else(|e| e.into_inner()) = Some(key.clone());
        Ok(())
    }
}

/// Backup server fake with a current descriptor and a publish log.
#[derive(Default)]
pub struct FakeBackup {
    pub current: Mutex<Option<BackupDescriptor>>,
    pub published: Mutex<Vec<BackupDescriptor>>,
    pub publish_fails: bool,
    pub restore_fails: bool,
    pub fetches: Mutex<u32>,
}

impl FakeBackup {
    pub fn with_descriptor(descriptor: BackupDescriptor) -> Self {
        Self { current: Mutex::new(Some(descriptor)), ..Self::default() }
    }

    pub fn published(&self) -> Vec<BackupDescriptor> {
        self.published.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn fetch_count(&self) -> u32 {
        *self.fetches.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BackupService for FakeBackup {
    async fn fetch_current(&self) -> Result<Option<BackupDescriptor>, BackupError> {
        *self.fetches.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(self.current.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
    async fn publish(&self, descriptor: &BackupDescriptor) -> Result<(), BackupError> {
        if self.publish_fails {
            return Err(BackupError::Rejected("server said no".into()));
        }
        self.published.lock().unwrap_or_else(|e| e.into_inner()).push(descriptor.clone());
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(descriptor.clone());
        Ok(())
    }
    async fn restore_all(&self) -> Result<usize, BackupError> {
        if self.restore_fails {
            Err(BackupError::Transport("restore stream broke".into()))
        } else {
            Ok(3)
        }
    }
}

/// Gate whose readiness can be flipped mid-test.
#[derive(Default)]
pub struct ToggleGate {
    ready: AtomicBool,
}

impl ToggleGate {
    pub fn ready() -> Self {
        let gate = Self::default();
        gate.set_ready(true);
        gate
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

impl SyncGate for ToggleGate {
    fn rooms_loaded(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
    fn account_data_loaded(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
    fn device_keys_loaded(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
    fn has_synced(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Scanner returning a fixed undecryptable-event list.
#[derive(Default)]
pub struct FixedScanner {
    pub events: Vec<EventRef>,
}

#[async_trait]
impl RoomScanner for FixedScanner {
    async fn undecryptable_events(&self) -> Vec<EventRef> {
        self.events.clone()
    }
}

pub struct Harness {
    pub engine: Arc<RecordingEngine>,
    pub store: Arc<MemoryStore>,
    pub backup: Arc<FakeBackup>,
    pub gate: Arc<ToggleGate>,
    pub scanner: Arc<FixedScanner>,
    pub uia: Arc<UiaRelay>,
}

impl Harness {
    pub fn new(engine: RecordingEngine, store: MemoryStore, backup: FakeBackup) -> Self {
        Self {
            engine: Arc::new(engine),
            store: Arc::new(store),
            backup: Arc::new(backup),
            gate: Arc::new(ToggleGate::ready()),
            scanner: Arc::new(FixedScanner::default()),
            uia: Arc::new(UiaRelay::new()),
        }
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(USER_ID, DEVICE_ID, SigningKey::from_bytes(&DEVICE_SEED))
    }

    pub fn session(&self, wipe: bool) -> BootstrapSession<MockEnv> {
        self.session_with_env(MockEnv::new(), wipe)
    }

    pub fn session_with_env(&self, env: MockEnv, wipe: bool) -> BootstrapSession<MockEnv> {
        let config = SessionConfig {
            engine: Arc::clone(&self.engine) as Arc<dyn CryptoEngine>,
            store: Arc::clone(&self.store) as Arc<dyn SecretStore>,
            backup: Arc::clone(&self.backup) as Arc<dyn BackupService>,
            gate: Arc::clone(&self.gate) as Arc<dyn SyncGate>,
            scanner: Arc::clone(&self.scanner) as Arc<dyn RoomScanner>,
            uia: Arc::clone(&self.uia),
            identity: self.identity(),
            wipe,
        };
        BootstrapSession::new(env, config)
    }
}
