//! Trust-signer scenarios with real signature verification.
//!
//! The fakes record what gets published; the oracle is cryptographic:
//! both descriptor signatures must verify against the canonical payload
//! with independently derived public keys.

#![allow(clippy::unwrap_used)]

#[allow(dead_code)]
mod common;

use common::{DEVICE_SEED, FakeBackup, Harness, MASTER_SEED, MemoryStore, RecordingEngine, USER_ID};
use ed25519_dalek::SigningKey;
use serde_json::json;
use vaultline_bootstrap::{TrustSignError, sign_and_republish};
use vaultline_core::canonical::{encode_public_key, verify_json};
use vaultline_core::{BackupDescriptor, master_key_id};

fn descriptor() -> BackupDescriptor {
    BackupDescriptor {
        version: "3".into(),
        algorithm: "m.megolm_backup.v1.curve25519-aes-sha2".into(),
        auth_data: json!({"public_key": "backup-pub-key"}),
    }
}

#[tokio::test]
async fn both_signatures_verify_against_canonical_payload() {
    let harness = Harness::new(
        RecordingEngine::default(),
        MemoryStore::default(),
        FakeBackup::with_descriptor(descriptor()),
    );
    let identity = harness.identity();

    sign_and_republish(&identity, &*harness.engine, &*harness.backup).await.unwrap();

    let published = harness.backup.published();
    assert_eq!(published.len(), 1);
    let signed = &published[0];
    let payload = signed.signable_payload();

    let device_key = SigningKey::from_bytes(&DEVICE_SEED).verifying_key();
    let device_sig = signed.signature(USER_ID, "ed25519:DEVICEID").unwrap();
    verify_json(&device_key, &payload, device_sig).unwrap();

    let master_key = SigningKey::from_bytes(&MASTER_SEED).verifying_key();
    let master_id = master_key_id(&encode_public_key(&master_key));
    let master_sig = signed.signature(USER_ID, &master_id).unwrap();
    verify_json(&master_key, &payload, master_sig).unwrap();
}

#[tokio::test]
async fn existing_signatures_survive_resigning() {
    let mut existing = descriptor();
    existing.attach_signature("@bob:example.org", "ed25519:OTHER".into(), "bobsig".into());
    let harness = Harness::new(
        RecordingEngine::default(),
        MemoryStore::default(),
        FakeBackup::with_descriptor(existing),
    );

    sign_and_republish(&harness.identity(), &*harness.engine, &*harness.backup).await.unwrap();

    let signed = &harness.backup.published()[0];
    assert_eq!(signed.signature("@bob:example.org", "ed25519:OTHER"), Some("bobsig"));
    assert!(signed.signature(USER_ID, "ed25519:DEVICEID").is_some());
}

#[tokio::test]
async fn foreign_signatures_do_not_affect_the_signed_bytes() {
    // Two servers, one with a pre-signed descriptor, one without. The
    // signature computed over both must be identical because `signatures`
    // is stripped from the payload.
    let plain =
        Harness::new(RecordingEngine::default(), MemoryStore::default(), FakeBackup::with_descriptor(descriptor()));
    let mut presigned_desc = descriptor();
    presigned_desc.attach_signature("@bob:example.org", "ed25519:OTHER".into(), "bobsig".into());
    let presigned = Harness::new(
        RecordingEngine::default(),
        MemoryStore::default(),
        FakeBackup::with_descriptor(presigned_desc),
    );

    sign_and_republish(&plain.identity(), &*plain.engine, &*plain.backup).await.unwrap();
    sign_and_republish(&presigned.identity(), &*presigned.engine, &*presigned.backup)
        .await
        .unwrap();

    let a = plain.backup.published()[0].signature(USER_ID, "ed25519:DEVICEID").unwrap().to_owned();
    let b = presigned.backup.published()[0]
        .signature(USER_ID, "ed25519:DEVICEID")
        .unwrap()
        .to_owned();
    assert_eq!(a, b);
}

#[tokio::test]
async fn missing_backup_is_reported() {
    let harness =
        Harness::new(RecordingEngine::default(), MemoryStore::default(), FakeBackup::default());

    let result = sign_and_republish(&harness.identity(), &*harness.engine, &*harness.backup).await;
    assert_eq!(result, Err(TrustSignError::NoBackup));
    assert!(harness.backup.published().is_empty());
}

#[tokio::test]
async fn publish_rejection_is_reported() {
    let backup = FakeBackup { publish_fails: true, ..FakeBackup::with_descriptor(descriptor()) };
    let harness = Harness::new(RecordingEngine::default(), MemoryStore::default(), backup);

    let result = sign_and_republish(&harness.identity(), &*harness.engine, &*harness.backup).await;
    assert!(matches!(result, Err(TrustSignError::Publish(_))));
}

#[tokio::test]
async fn signs_the_descriptor_currently_on_the_server() {
    // The server-side version changed after bootstrap started; the signer
    // must sign what is there now, not a stale copy.
    let harness = Harness::new(
        RecordingEngine::default(),
        MemoryStore::default(),
        FakeBackup::with_descriptor(descriptor()),
    );
    let replacement = BackupDescriptor {
        version: "4".into(),
        algorithm: "m.megolm_backup.v1.curve25519-aes-sha2".into(),
        auth_data: json!({"public_key": "rotated-pub-key"}),
    };
    *harness.backup.current.lock().unwrap() = Some(replacement);

    sign_and_republish(&harness.identity(), &*harness.engine, &*harness.backup).await.unwrap();

    let signed = &harness.backup.published()[0];
    assert_eq!(signed.version, "4");
    assert_eq!(signed.auth_data.get("public_key").unwrap(), "rotated-pub-key");
}
