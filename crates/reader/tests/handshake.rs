//! End to end handshakes against a simulated token

mod common;

use common::{SimulatedToken, public_key_of, scratch_dir};
use nfcauth_apdu_core::ChunkReassembler;
use nfcauth_reader::{
    AuthOutcome, AuthState, Authentication, CredentialStore, DeviceRecord, Error, JsonFileStore,
    MemoryStore, ReaderIdentity, RegistrationOutcome, RegistrationState, RejectReason,
    Registration,
};
use p256::ecdsa::SigningKey;
use rand_v8::rngs::OsRng;

fn identity() -> ReaderIdentity {
    ReaderIdentity::default()
}

#[test]
fn test_registration_stores_token_key() {
    let identity = identity();
    let store = MemoryStore::new();
    let mut token = SimulatedToken::new("u1", "Alice", &identity.reader_id);

    let mut registration = Registration::new(&identity, &store, ChunkReassembler::default());
    let outcome = registration.run(&mut token).unwrap();

    let RegistrationOutcome::Completed(record) = outcome else {
        panic!("expected a completed registration, got {outcome:?}");
    };
    assert_eq!(record.user_id, "u1");
    assert_eq!(record.user_name, "Alice");
    assert_eq!(record.public_key, token.public_key());
    assert_eq!(registration.state(), RegistrationState::Completed);

    assert_eq!(store.list().unwrap(), vec![record]);
    assert!(token.completed);
    // SELECT, request, GET RESPONSE rounds, complete
    assert_eq!(token.instructions().first(), Some(&(0xA4, 0x00)));
    assert_eq!(token.instructions().last(), Some(&(0x01, 0x01)));
}

#[test]
fn test_registration_identity_mismatch() {
    let identity = identity();
    let store = MemoryStore::new();
    let mut token = SimulatedToken::new("u1", "Alice", "some-other-reader");

    let mut registration = Registration::new(&identity, &store, ChunkReassembler::default());
    let err = registration.run(&mut token).unwrap_err();

    match err {
        Error::IdentityMismatch { expected, actual } => {
            assert_eq!(expected, identity.reader_id);
            assert_eq!(actual, "some-other-reader");
        }
        other => panic!("expected identity mismatch, got {other:?}"),
    }
    assert!(store.is_empty());
    assert!(!token.completed);
    assert!(!token.instructions().contains(&(0x01, 0x01)));
}

#[test]
fn test_registration_rollback_in_memory() {
    let identity = identity();
    let store = MemoryStore::new();
    let mut token = SimulatedToken::new("u1", "Alice", &identity.reader_id);
    token.complete_status = [0x6F, 0x00];

    let mut registration = Registration::new(&identity, &store, ChunkReassembler::default());
    let err = registration.run(&mut token).unwrap_err();

    assert!(matches!(err, Error::RegistrationCompleteFailed { .. }));
    assert_eq!(registration.state(), RegistrationState::RolledBack);
    assert!(store.is_empty());
}

#[test]
fn test_registration_rollback_on_disk() {
    let dir = scratch_dir();
    let path = dir.join("devices.json");
    let identity = identity();

    {
        let store = JsonFileStore::open(&path).unwrap();
        let mut token = SimulatedToken::new("u1", "Alice", &identity.reader_id);
        token.complete_status = [0x6A, 0x80];

        let err = Registration::new(&identity, &store, ChunkReassembler::default())
            .run(&mut token)
            .unwrap_err();
        assert!(matches!(err, Error::RegistrationCompleteFailed { .. }));
    }

    let reopened = JsonFileStore::open(&path).unwrap();
    assert!(!reopened.contains("u1").unwrap());
    assert!(reopened.list().unwrap().is_empty());

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_registration_persists_across_reopen() {
    let dir = scratch_dir();
    let path = dir.join("devices.json");
    let identity = identity();
    let mut token = SimulatedToken::new("u1", "Alice", &identity.reader_id);

    {
        let store = JsonFileStore::open(&path).unwrap();
        Registration::new(&identity, &store, ChunkReassembler::default())
            .run(&mut token)
            .unwrap();
    }

    let reopened = JsonFileStore::open(&path).unwrap();
    assert_eq!(reopened.get_public_key("u1").unwrap(), token.public_key());

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_registration_duplicate_keeps_existing_record() {
    let identity = identity();
    let existing = DeviceRecord::new("u1", "Alice", "original-key");
    let store = MemoryStore::with_records([existing.clone()]);
    let mut token = SimulatedToken::new("u1", "Mallory", &identity.reader_id);

    let err = Registration::new(&identity, &store, ChunkReassembler::default())
        .run(&mut token)
        .unwrap_err();

    assert!(matches!(err, Error::AlreadyRegistered(ref user) if user == "u1"));
    assert_eq!(store.get_record("u1").unwrap(), existing);
    assert!(!token.completed);
}

#[test]
fn test_authentication_verified() {
    let identity = identity();
    let token = SimulatedToken::new("u1", "Alice", &identity.reader_id);
    let store = MemoryStore::with_records([DeviceRecord::new("u1", "Alice", token.public_key())]);
    let mut token = token;

    let mut authentication = Authentication::new(&identity, &store, ChunkReassembler::default());
    let outcome = authentication.run(&mut token).unwrap();

    assert_eq!(
        outcome,
        AuthOutcome::Verified {
            user_id: "u1".to_string(),
            user_name: "Alice".to_string(),
        }
    );
    assert_eq!(authentication.state(), AuthState::Verified);
    assert!(!token.notified_unknown);
}

#[test]
fn test_authentication_fresh_nonce_per_attempt() {
    let identity = identity();
    let mut token = SimulatedToken::new("u1", "Alice", &identity.reader_id);
    let store = MemoryStore::with_records([DeviceRecord::new("u1", "Alice", token.public_key())]);

    for _ in 0..2 {
        Authentication::new(&identity, &store, ChunkReassembler::default())
            .run(&mut token)
            .unwrap();
    }

    let challenges: Vec<serde_json::Value> = token
        .commands
        .iter()
        .filter(|c| c.header() == [0xD0, 0x02, 0x00, 0x00])
        .map(|c| serde_json::from_slice(c.data().unwrap()).unwrap())
        .collect();
    assert_eq!(challenges.len(), 2);
    assert_eq!(challenges[0]["reader_id"], identity.reader_id.as_str());
    assert_ne!(challenges[0]["nonce"], challenges[1]["nonce"]);
}

#[test]
fn test_authentication_unknown_user_is_notified() {
    let identity = identity();
    let store = MemoryStore::new();
    let mut token = SimulatedToken::new("ghost", "Casper", &identity.reader_id);

    let outcome = Authentication::new(&identity, &store, ChunkReassembler::default())
        .run(&mut token)
        .unwrap();

    assert_eq!(
        outcome,
        AuthOutcome::Rejected(RejectReason::UnknownUser("ghost".to_string()))
    );
    assert!(token.notified_unknown);
}

#[test]
fn test_authentication_wrong_key_is_rejected() {
    let identity = identity();
    let impostor = SigningKey::random(&mut OsRng);
    let store = MemoryStore::with_records([DeviceRecord::new("u1", "Alice", public_key_of(&impostor))]);
    let mut token = SimulatedToken::new("u1", "Alice", &identity.reader_id);

    let mut authentication = Authentication::new(&identity, &store, ChunkReassembler::default());
    let outcome = authentication.run(&mut token).unwrap();

    assert_eq!(
        outcome,
        AuthOutcome::Rejected(RejectReason::InvalidSignature("u1".to_string()))
    );
    assert_eq!(authentication.state(), AuthState::Rejected);
}

#[test]
fn test_authentication_reader_not_registered() {
    let identity = identity();
    let store = MemoryStore::new();
    let mut token = SimulatedToken::new("u1", "Alice", &identity.reader_id);
    token.auth_status = Some([0x69, 0x83]);

    let outcome = Authentication::new(&identity, &store, ChunkReassembler::default())
        .run(&mut token)
        .unwrap();

    assert_eq!(outcome, AuthOutcome::Rejected(RejectReason::ReaderNotRegistered));
}

#[test]
fn test_authentication_user_verification_required() {
    let identity = identity();
    let store = MemoryStore::new();
    let mut token = SimulatedToken::new("u1", "Alice", &identity.reader_id);
    token.auth_status = Some([0x63, 0x00]);

    let err = Authentication::new(&identity, &store, ChunkReassembler::default())
        .run(&mut token)
        .unwrap_err();

    assert!(matches!(err, Error::UserVerificationRequired));
    assert!(err.is_retryable());
}

#[test]
fn test_register_then_authenticate() {
    let identity = identity();
    let store = MemoryStore::new();
    let mut token = SimulatedToken::new("u1", "Alice", &identity.reader_id);

    Registration::new(&identity, &store, ChunkReassembler::default())
        .run(&mut token)
        .unwrap();
    let outcome = Authentication::new(&identity, &store, ChunkReassembler::default())
        .run(&mut token)
        .unwrap();

    assert!(matches!(outcome, AuthOutcome::Verified { ref user_id, .. } if user_id == "u1"));
}
