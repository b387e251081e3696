//! Bootstrap session state machine.
//!
//! [`BootstrapSession`] owns one bootstrap attempt end to end: it waits for
//! transport readiness, starts the external engine, answers each reported
//! engine state through the decision table, runs the recovery-secret
//! lifecycle, and performs post-success finalization including the backup
//! trust signature.
//!
//! The session is the only writer of its own state and never runs two
//! engine transitions concurrently: the host delivers engine notifications
//! one at a time through [`BootstrapSession::on_engine_state`], and each
//! transition is invoked only after the session finishes its bookkeeping
//! for the notification that triggered it.

use std::sync::Arc;
use std::time::Duration;

use vaultline_core::{
    BackupService, BootstrapState, CryptoEngine, DeviceIdentity, EngineError, Environment,
    RecoveryKey, RoomScanner, SecretClass, SecretStore, SyncGate,
};

use crate::decision::{Decision, EngineCall, decide};
use crate::phase::{FieldError, Phase};
use crate::signal::UiSignal;
use crate::signer;
use crate::uia::UiaRelay;

/// Bound on the transport-readiness wait.
const TRANSPORT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between readiness checks.
const TRANSPORT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Number of verification-secret poll attempts.
const VERIFICATION_POLL_ATTEMPTS: u32 = 5;

/// Interval between verification-secret polls.
const VERIFICATION_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// External collaborators and identity for one bootstrap session.
pub struct SessionConfig {
    /// The external crypto/protocol engine.
    pub engine: Arc<dyn CryptoEngine>,
    /// On-device recovery-key persistence.
    pub store: Arc<dyn SecretStore>,
    /// Backup server surface.
    pub backup: Arc<dyn BackupService>,
    /// Transport readiness signals.
    pub gate: Arc<dyn SyncGate>,
    /// Undecryptable-message scan for the restore fallback.
    pub scanner: Arc<dyn RoomScanner>,
    /// Step-up authentication relay.
    pub uia: Arc<UiaRelay>,
    /// Account and device identity for trust signing.
    pub identity: DeviceIdentity,
    /// Destroy-and-recreate semantics for every wipe decision.
    pub wipe: bool,
}

/// A freshly generated recovery secret awaiting acknowledgment.
struct GeneratedSecret {
    key: RecoveryKey,
    copied: bool,
    save_to_device: bool,
}

/// Live orchestration instance for one bootstrap attempt.
pub struct BootstrapSession<E: Environment> {
    env: E,
    engine: Arc<dyn CryptoEngine>,
    store: Arc<dyn SecretStore>,
    backup: Arc<dyn BackupService>,
    gate: Arc<dyn SyncGate>,
    scanner: Arc<dyn RoomScanner>,
    uia: Arc<UiaRelay>,
    identity: DeviceIdentity,

    wipe_intent: bool,
    phase: Phase,
    /// Last engine state reported, whether or not it was applied.
    last_state: Option<BootstrapState>,
    /// Notification parked while awaiting acknowledgment; re-applied once
    /// the user confirms the generated secret.
    suppressed: Option<BootstrapState>,
    awaiting_ack: bool,
    pending_ui: Option<UiSignal>,
    torn_down: bool,
    finalized: bool,
    /// The current error admits restart-with-wipe: set only for readiness
    /// failures and failed secret generation, where the session may be left
    /// half-configured.
    wipe_restart_allowed: bool,

    generated: Option<GeneratedSecret>,
    candidate: String,
    save_unlocked_key: bool,
    /// Unlock succeeded but the key was not persisted anywhere.
    unlocked_unsaved: bool,
    field_error: Option<FieldError>,
    busy: bool,
    container_unlocked: bool,
}

impl<E: Environment> BootstrapSession<E> {
    /// Create a session; call [`Self::start`] to begin.
    pub fn new(env: E, config: SessionConfig) -> Self {
        Self {
            env,
            engine: config.engine,
            store: config.store,
            backup: config.backup,
            gate: config.gate,
            scanner: config.scanner,
            uia: config.uia,
            identity: config.identity,
            wipe_intent: config.wipe,
            phase: Phase::Idle,
            last_state: None,
            suppressed: None,
            awaiting_ack: false,
            pending_ui: None,
            torn_down: false,
            finalized: false,
            wipe_restart_allowed: false,
            generated: None,
            candidate: String::new(),
            save_unlocked_key: false,
            unlocked_unsaved: false,
            field_error: None,
            busy: false,
            container_unlocked: false,
        }
    }

    /// Await transport readiness (bounded), then start the external engine.
    pub async fn start(&mut self) {
        if self.torn_down {
            return;
        }
        self.phase = Phase::WaitingForTransport;

        if !self.await_transport_ready().await {
            self.phase = Phase::Error {
                message: "transport session not ready".into(),
                retryable: true,
            };
            self.wipe_restart_allowed = true;
            return;
        }
        if self.torn_down {
            return;
        }

        self.phase = Phase::Working;
        if let Err(e) = self.engine.start().await {
            self.fail(format!("engine start failed: {e}"));
        }
    }

    async fn await_transport_ready(&self) -> bool {
        let started = self.env.now();
        loop {
            if self.gate.is_ready() {
                return true;
            }
            if self.env.now() - started >= TRANSPORT_READY_TIMEOUT {
                return false;
            }
            self.env.sleep(TRANSPORT_POLL_INTERVAL).await;
        }
    }

    /// The decision function, invoked on every engine state notification.
    ///
    /// While a generated secret awaits acknowledgment, every notification
    /// except a terminal error is parked rather than applied, so the engine
    /// cannot silently advance past the unacknowledged secret.
    pub async fn on_engine_state(&mut self, state: BootstrapState) {
        if self.torn_down {
            return;
        }
        self.last_state = Some(state.clone());

        if self.awaiting_ack && !matches!(state, BootstrapState::Error { .. }) {
            tracing::debug!(?state, "suppressing notification while secret awaits acknowledgment");
            self.suppressed = Some(state);
            return;
        }

        self.dispatch(state).await;
    }

    async fn dispatch(&mut self, state: BootstrapState) {
        match decide(&state, self.wipe_intent) {
            Decision::Advance(call) => {
                self.busy = true;
                self.phase = Phase::Working;
                let result = self.apply(call).await;
                self.busy = false;
                if let Err(e) = result {
                    self.fail(format!("engine transition failed: {e}"));
                }
            },
            Decision::AdvanceAfterBackupProbe { requested } => {
                self.advance_backup_wipe(requested).await;
            },
            Decision::Generate => self.generate_secret().await,
            Decision::Unlock => self.prepare_unlock().await,
            Decision::AwaitAuthentication => {
                // The relay surfaces the challenge; the engine resumes on its
                // own once the challenge resolves.
                self.phase = Phase::Working;
            },
            Decision::Complete => self.finalize().await,
            Decision::Fail { message } => self.fail(message),
            Decision::Ignore => {},
        }
    }

    async fn apply(&self, call: EngineCall) -> Result<(), EngineError> {
        tracing::debug!(?call, "auto-advancing bootstrap decision");
        match call {
            EngineCall::WipeSecretStorage(wipe) => self.engine.wipe_secret_storage(wipe).await,
            EngineCall::WipeCrossSigning(wipe) => self.engine.wipe_cross_signing(wipe).await,
            EngineCall::EstablishSubkeys(subkeys) => self.engine.establish_subkeys(subkeys).await,
            EngineCall::WipeKeyBackup(wipe) => self.engine.wipe_key_backup(wipe).await,
            EngineCall::EstablishKeyBackup(create) => {
                self.engine.establish_key_backup(create).await
            },
            EngineCall::IgnoreMalformedSecrets(ignore) => {
                self.engine.ignore_malformed_secrets(ignore).await
            },
            EngineCall::UseExistingSecretStorage(reuse) => {
                self.engine.use_existing_secret_storage(reuse).await
            },
            EngineCall::MigrateLegacySecrets(migrate) => {
                self.engine.migrate_legacy_secrets(migrate).await
            },
        }
    }

    /// Probe the server before answering the backup-wipe confirmation:
    /// "no backup" must be treated as "must create", overriding the
    /// session's wipe intent.
    async fn advance_backup_wipe(&mut self, requested: bool) {
        self.busy = true;
        self.phase = Phase::Working;

        let wipe = match self.backup.fetch_current().await {
            Ok(Some(_)) => requested,
            Ok(None) => {
                tracing::debug!("no backup on server, forcing wipe answer to true");
                true
            },
            Err(e) => {
                self.busy = false;
                self.fail(format!("backup probe failed: {e}"));
                return;
            },
        };

        let result = self.engine.wipe_key_backup(wipe).await;
        self.busy = false;
        if let Err(e) = result {
            self.fail(format!("engine transition failed: {e}"));
        }
    }

    /// Generate the new secret container and gate on acknowledgment.
    ///
    /// Generation failure is fatal for the session: a freshly created
    /// container cannot be left half-configured.
    async fn generate_secret(&mut self) {
        self.busy = true;
        self.phase = Phase::GeneratingSecret;

        // May trigger nested engine transitions while the secret-sharing
        // setup runs; those arrive as notifications after this returns.
        let result = self.engine.generate_secret_storage().await;
        self.busy = false;
        if self.torn_down {
            return;
        }

        match result {
            Ok(key) => {
                self.generated =
                    Some(GeneratedSecret { key, copied: false, save_to_device: false });
                self.awaiting_ack = true;
                self.phase = Phase::SecretGenerated;
            },
            Err(e) => {
                self.fail(format!("secret generation failed: {e}"));
                // The container may be half-configured now.
                self.wipe_restart_allowed = true;
            },
        }
    }

    /// Surface the unlock prompt, pre-populated from the device store.
    /// The candidate is never auto-submitted.
    async fn prepare_unlock(&mut self) {
        self.phase = Phase::UnlockRequired;
        match self.store.get().await {
            Ok(Some(key)) => self.candidate = key.expose().to_owned(),
            Ok(None) => {},
            Err(e) => tracing::warn!(error = %e, "stored recovery-key lookup failed"),
        }
    }

    /// Mark the generated key as copied to the clipboard.
    pub fn set_secret_copied(&mut self) {
        if let Some(secret) = &mut self.generated {
            secret.copied = true;
        }
    }

    /// Set the save-to-device intent for the generated key.
    pub fn set_save_to_device(&mut self, save: bool) {
        if let Some(secret) = &mut self.generated {
            secret.save_to_device = save;
        }
    }

    /// Set the save-to-device intent for a key used to unlock.
    pub fn set_save_unlocked_key(&mut self, save: bool) {
        self.save_unlocked_key = save;
    }

    /// Update the unlock candidate field.
    pub fn set_candidate(&mut self, candidate: impl Into<String>) {
        self.candidate = candidate.into();
        self.field_error = None;
    }

    /// Whether the generation-phase confirm action is enabled.
    ///
    /// Hard security invariant: a freshly generated secret cannot be
    /// dismissed until it was copied or marked for saving to the device.
    pub fn can_confirm(&self) -> bool {
        self.generated
            .as_ref()
            .is_some_and(|secret| secret.copied || secret.save_to_device)
    }

    /// Acknowledge the generated secret and resume the flow.
    ///
    /// Re-applies the notification parked while the gate was closed, which
    /// may cascade through further auto-advanced states before pausing
    /// again.
    pub async fn confirm_generated_secret(&mut self) {
        if self.torn_down || !self.can_confirm() {
            return;
        }
        self.awaiting_ack = false;
        self.phase = Phase::Working;

        if let Some(state) = self.suppressed.take() {
            self.dispatch(state).await;
        }
    }

    /// Attempt to unlock the existing container with a user-supplied key.
    ///
    /// On success the device is self-signed before this method returns, so
    /// an early termination cannot leave the device permanently unsigned.
    pub async fn unlock_with_secret(&mut self, candidate: &str) {
        if self.torn_down {
            return;
        }
        if candidate.trim().is_empty() {
            self.field_error = Some(FieldError::EmptyRecoveryKey);
            return;
        }
        self.field_error = None;
        self.busy = true;

        let key = RecoveryKey::new(candidate);
        match self.engine.unlock_secret_storage(&key).await {
            Err(EngineError::InvalidRecoveryKey) => {
                self.busy = false;
                self.field_error = Some(FieldError::InvalidRecoveryKey);
                return;
            },
            Err(e) => {
                self.busy = false;
                self.fail(format!("container unlock failed: {e}"));
                return;
            },
            Ok(()) => {},
        }

        self.container_unlocked = true;
        if self.save_unlocked_key {
            if let Err(e) = self.store.put(&key).await {
                tracing::warn!(error = %e, "failed to persist recovery key to device store");
            }
        } else {
            self.unlocked_unsaved = true;
        }

        if let Err(e) = self.engine.open_secret_storage().await {
            self.busy = false;
            self.fail(format!("engine transition failed: {e}"));
            return;
        }
        if let Err(e) = self.engine.self_sign_device(Some(&key)).await {
            tracing::warn!(error = %e, "device self-signing failed after unlock");
        }

        self.busy = false;
        self.phase = Phase::Working;
    }

    /// Fallback when no recovery key is known: run interactive verification
    /// with another trusted device, poll for gossiped secrets, and finalize
    /// regardless of the poll outcome.
    pub async fn request_device_verification(&mut self) {
        if self.torn_down {
            return;
        }
        self.pending_ui = Some(UiSignal::StartVerification);
        self.phase = Phase::AwaitingVerification;

        for _ in 0..VERIFICATION_POLL_ATTEMPTS {
            self.env.sleep(VERIFICATION_POLL_INTERVAL).await;
            if self.torn_down {
                return;
            }
            if self.secrets_cached().await {
                break;
            }
        }

        // A negative poll is not fatal: the device-to-device transfer may
        // still be in flight and completes via background sync.
        self.finalize().await;
    }

    async fn secrets_cached(&self) -> bool {
        for class in SecretClass::ALL {
            if !self.engine.is_cached(class).await {
                return false;
            }
        }
        true
    }

    /// Request session cancellation.
    ///
    /// When a fresh unacknowledged secret or an unsaved unlock is in
    /// flight, cancellation needs explicit confirmation via
    /// [`Self::confirm_cancel`] to prevent accidental data loss.
    pub fn cancel(&mut self) {
        if self.torn_down || self.phase.is_terminal() {
            return;
        }
        if self.awaiting_ack {
            self.pending_ui = Some(UiSignal::ConfirmKeyLoss);
            return;
        }
        if self.unlocked_unsaved {
            self.pending_ui = Some(UiSignal::ConfirmCancel);
            return;
        }
        self.teardown_cancelled();
    }

    /// Confirm a cancellation that required acknowledgment.
    pub fn confirm_cancel(&mut self) {
        if self.torn_down || self.phase.is_terminal() {
            return;
        }
        self.teardown_cancelled();
    }

    fn teardown_cancelled(&mut self) {
        self.clear_secrets();
        self.torn_down = true;
        self.phase = Phase::Cancelled;
    }

    /// Tear the session down when the owning UI goes away.
    ///
    /// Secret material is cleared; in-flight suspending calls observe the
    /// teardown flag before their next state mutation.
    pub fn teardown(&mut self) {
        self.clear_secrets();
        self.torn_down = true;
    }

    fn clear_secrets(&mut self) {
        self.generated = None;
        self.candidate.clear();
        self.awaiting_ack = false;
        self.suppressed = None;
    }

    /// Retry after a retryable error. Explicit, never automatic.
    pub async fn retry(&mut self) {
        if !matches!(self.phase, Phase::Error { retryable: true, .. }) {
            return;
        }
        self.reset_for_restart();
        self.start().await;
    }

    /// Restart the whole session with destroy-and-recreate semantics.
    ///
    /// Accepted only while [`Self::can_restart_with_wipe`] holds:
    /// genuinely unrecoverable session corruption (readiness failure,
    /// half-configured container) is the only reason to wipe. Other fatal
    /// errors keep existing key material intact.
    pub async fn restart_with_wipe(&mut self) {
        if !self.can_restart_with_wipe() {
            return;
        }
        self.wipe_intent = true;
        self.reset_for_restart();
        self.start().await;
    }

    /// Whether restart-with-wipe is offered for the current error.
    pub fn can_restart_with_wipe(&self) -> bool {
        matches!(self.phase, Phase::Error { .. }) && self.wipe_restart_allowed
    }

    fn reset_for_restart(&mut self) {
        self.clear_secrets();
        self.wipe_restart_allowed = false;
        self.last_state = None;
        self.field_error = None;
        self.busy = false;
        self.finalized = false;
        self.container_unlocked = false;
        self.unlocked_unsaved = false;
        self.pending_ui = None;
        self.phase = Phase::Idle;
    }

    /// Post-success finalization.
    ///
    /// Runs once per session (idempotent, guarded): persists the recovery
    /// secret when requested, re-caches and re-signs from cached secrets,
    /// trust-signs the backup descriptor, restores backed-up keys with a
    /// re-request fallback, and drops the cached step-up credential.
    pub async fn finalize(&mut self) {
        if self.torn_down || self.finalized {
            return;
        }
        self.finalized = true;
        self.busy = true;

        if let Some(secret) = &self.generated {
            if secret.save_to_device {
                if let Err(e) = self.store.put(&secret.key).await {
                    tracing::warn!(error = %e, "failed to persist recovery key to device store");
                }
            }
        }

        // Idempotent; covers the existing-backup path where no unlock ran.
        if let Err(e) = self.engine.cache_all_secrets().await {
            tracing::warn!(error = %e, "secret caching failed during finalization");
        }
        if let Err(e) = self.engine.self_sign_device(None).await {
            tracing::warn!(error = %e, "device self-signing failed during finalization");
        }

        if self.container_available().await {
            if let Err(e) =
                signer::sign_and_republish(&self.identity, &*self.engine, &*self.backup).await
            {
                tracing::warn!(error = %e, "trust signing failed; backup stays unverified");
            }
        }

        match self.backup.restore_all().await {
            Ok(count) => tracing::debug!(count, "restored keys from online backup"),
            Err(e) => {
                tracing::warn!(error = %e, "backup restore failed, falling back to re-requests");
                let events = self.scanner.undecryptable_events().await;
                for event in &events {
                    if let Err(e) = self.engine.request_room_key(event).await {
                        tracing::warn!(error = %e, room = %event.room_id, "key re-request failed");
                    }
                }
            },
        }

        self.uia.clear_cached();
        self.unlocked_unsaved = false;
        self.busy = false;
        self.phase = Phase::Done;
        self.pending_ui = Some(UiSignal::Complete);
    }

    /// The secret container is usable for trust signing: unlocked in this
    /// session, or its master secret is already cached from earlier.
    async fn container_available(&self) -> bool {
        self.container_unlocked || self.engine.is_cached(SecretClass::CrossSigningMaster).await
    }

    fn fail(&mut self, message: String) {
        tracing::warn!(%message, "bootstrap session failed");
        self.wipe_restart_allowed = false;
        self.phase = Phase::Error { message, retryable: false };
    }

    /// Current observable phase.
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// The generated recovery key, for display. `None` outside the
    /// generation flow.
    pub fn generated_key(&self) -> Option<&str> {
        self.generated.as_ref().map(|secret| secret.key.expose())
    }

    /// Current unlock-candidate field contents.
    pub fn candidate(&self) -> &str {
        &self.candidate
    }

    /// Current field-level input error, if any.
    pub fn field_error(&self) -> Option<FieldError> {
        self.field_error
    }

    /// A suspending operation is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Consume the pending UI signal, if one is outstanding.
    pub fn take_ui_signal(&mut self) -> Option<UiSignal> {
        self.pending_ui.take()
    }
}
