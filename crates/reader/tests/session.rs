//! Session loop behavior: polling, retries, deferred answers and stopping

mod common;

use std::thread;
use std::time::Duration;

use common::SimulatedToken;
use nfcauth_apdu_core::{Bytes, CardTransport, MockTransport, TransportError};

const REGISTRATION_REQUEST: [u8; 4] = [0xD0, 0x01, 0x00, 0x00];
use nfcauth_reader::{
    AuthOutcome, CredentialStore, DeviceRecord, Error, MemoryStore, Mode, Presentation,
    ReaderConfig, RejectReason, Session, SessionOutcome, stop_pair,
};

fn fast_config() -> ReaderConfig {
    let mut config = ReaderConfig::default();
    config.session.poll_interval_ms = 1;
    config.session.retry_delay_ms = 0;
    config
}

#[test]
fn test_session_registers_token() {
    let config = fast_config();
    let token = SimulatedToken::new("u1", "Alice", &config.reader.reader_id);
    let (_handle, stop) = stop_pair();

    let mut session = Session::new(config, token, MemoryStore::new(), stop);
    let outcome = session.run(Mode::Register).unwrap();

    let SessionOutcome::Registered(record) = outcome else {
        panic!("expected a registration, got {outcome:?}");
    };
    let (token, store) = session.into_parts();
    assert_eq!(record.public_key, token.public_key());
    assert_eq!(store.list().unwrap(), vec![record]);
    assert!(!token.is_connected());
}

#[test]
fn test_session_authenticates_token() {
    let config = fast_config();
    let token = SimulatedToken::new("u1", "Alice", &config.reader.reader_id);
    let store = MemoryStore::with_records([DeviceRecord::new("u1", "Alice", token.public_key())]);
    let (_handle, stop) = stop_pair();

    let outcome = Session::new(config, token, store, stop)
        .run(Mode::Authenticate)
        .unwrap();

    assert_eq!(
        outcome,
        SessionOutcome::Authentication(AuthOutcome::Verified {
            user_id: "u1".to_string(),
            user_name: "Alice".to_string(),
        })
    );
}

#[test]
fn test_run_once_with_empty_field() {
    let config = fast_config();
    let token = SimulatedToken::new("u1", "Alice", &config.reader.reader_id).with_presence([]);
    let (_handle, stop) = stop_pair();

    let mut session = Session::new(config, token, MemoryStore::new(), stop);
    assert_eq!(session.run_once(Mode::Register).unwrap(), Presentation::NoToken);
    assert!(session.transport().commands.is_empty());
}

#[test]
fn test_session_recovers_on_next_presentation() {
    let transport = MockTransport::new([
        // First presentation: SELECT refused
        Bytes::from_static(&[0x6A, 0x82]),
        // Second presentation: SELECT ok, reader unknown to the token
        Bytes::from_static(&[0x90, 0x00]),
        Bytes::from_static(&[0x69, 0x83]),
    ])
    .exhaustible()
    .with_presence([true, true, true, false, true]);
    let (_handle, stop) = stop_pair();

    let mut session = Session::new(fast_config(), transport, MemoryStore::new(), stop);
    let outcome = session.run(Mode::Authenticate).unwrap();

    assert_eq!(
        outcome,
        SessionOutcome::Authentication(AuthOutcome::Rejected(RejectReason::ReaderNotRegistered))
    );
    let (transport, _) = session.into_parts();
    assert_eq!(transport.commands.len(), 3);
    assert_eq!(transport.releases, 1);
}

#[test]
fn test_session_link_loss_waits_for_next_presentation() {
    let mut transport = MockTransport::new([Bytes::from_static(&[0x90, 0x00])])
        .exhaustible()
        .with_presence([true, false, true]);
    transport.responses.push_front(Err(TransportError::link("card reset")));
    transport.push_response(Bytes::from_static(&[0x69, 0x83]));
    let (_handle, stop) = stop_pair();

    let outcome = Session::new(fast_config(), transport, MemoryStore::new(), stop)
        .run(Mode::Authenticate)
        .unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Authentication(AuthOutcome::Rejected(RejectReason::ReaderNotRegistered))
    );
}

#[test]
fn test_session_deferred_budget() {
    let mut config = fast_config();
    config.session.max_deferred_polls = 3;
    let (_handle, stop) = stop_pair();

    // Every command answered with a bare 90 00: the token keeps deferring
    let mut session = Session::new(config, MockTransport::with_success(), MemoryStore::new(), stop);
    let err = session.run(Mode::Register).unwrap_err();

    assert!(matches!(err, Error::RegistrationTimedOut { attempts: 4 }));
    assert!(!err.is_retryable());
    let (transport, store) = session.into_parts();
    // SELECT and request per presentation
    assert_eq!(transport.commands.len(), 8);
    assert_eq!(transport.releases, 1);
    assert!(store.is_empty());
}

#[test]
fn test_session_fatal_config_error() {
    let mut config = fast_config();
    config.reader.reader_name = "x".repeat(300);
    let (_handle, stop) = stop_pair();

    let mut session = Session::new(config, MockTransport::with_success(), MemoryStore::new(), stop);
    let err = session.run(Mode::Register).unwrap_err();

    assert!(!err.is_retryable());
    let (transport, _) = session.into_parts();
    assert_eq!(transport.releases, 1);
}

#[test]
fn test_stop_before_run() {
    let (handle, stop) = stop_pair();
    handle.stop();

    let mut session = Session::new(fast_config(), MockTransport::with_success(), MemoryStore::new(), stop);
    assert_eq!(session.run(Mode::Register).unwrap(), SessionOutcome::Stopped);

    let (transport, _) = session.into_parts();
    assert!(transport.commands.is_empty());
    assert_eq!(transport.releases, 1);
}

#[test]
fn test_stop_while_waiting_for_token() {
    let mut config = fast_config();
    config.session.poll_interval_ms = 10;
    let transport = MockTransport::with_success().absent();
    let (handle, stop) = stop_pair();

    let worker = thread::spawn(move || {
        let mut session = Session::new(config, transport, MemoryStore::new(), stop);
        let outcome = session.run(Mode::Authenticate);
        (outcome, session.into_parts().0)
    });

    thread::sleep(Duration::from_millis(50));
    handle.stop();

    let (outcome, transport) = worker.join().unwrap();
    assert_eq!(outcome.unwrap(), SessionOutcome::Stopped);
    assert!(transport.commands.is_empty());
    assert_eq!(transport.releases, 1);
}

#[test]
fn test_failed_token_left_in_field_is_not_retried() {
    let config = fast_config();
    let token = SimulatedToken::new("u1", "Alice", "some-other-reader")
        .with_presence([true, true, true, false, true]);
    let (_handle, stop) = stop_pair();
    let mut session = Session::new(config, token, MemoryStore::new(), stop);

    assert!(matches!(
        session.run_once(Mode::Register),
        Err(Error::IdentityMismatch { .. })
    ));
    for _ in 0..2 {
        assert_eq!(session.run_once(Mode::Register).unwrap(), Presentation::AwaitingRemoval);
    }
    assert_eq!(session.transport().count(REGISTRATION_REQUEST), 1);

    // Removed and presented again
    assert_eq!(session.run_once(Mode::Register).unwrap(), Presentation::NoToken);
    assert!(session.run_once(Mode::Register).is_err());
    assert_eq!(session.transport().count(REGISTRATION_REQUEST), 2);
    assert!(session.store().is_empty());
}

#[test]
fn test_session_runs_one_handshake_per_presentation() {
    let mut config = fast_config();
    config.session.retry_delay_ms = 1;
    let token = SimulatedToken::new("u1", "Alice", "some-other-reader").with_presence([true; 20]);
    let (handle, stop) = stop_pair();

    let worker = thread::spawn(move || {
        let mut session = Session::new(config, token, MemoryStore::new(), stop);
        let outcome = session.run(Mode::Register);
        (outcome, session.into_parts().0)
    });

    thread::sleep(Duration::from_millis(100));
    handle.stop();

    let (outcome, token) = worker.join().unwrap();
    assert_eq!(outcome.unwrap(), SessionOutcome::Stopped);
    assert_eq!(token.count(REGISTRATION_REQUEST), 1);
    assert!(!token.completed);
}
