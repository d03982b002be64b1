//! Authentication handshake
//!
//! The reader sends a fresh nonce, the token answers with its user id and a
//! signature over the exact request bytes followed by that user id, and the
//! reader checks the signature against the key stored at registration.

use bytes::BytesMut;
use nfcauth_apdu_core::prelude::*;
use tracing::{debug, info, instrument};

use crate::config::ReaderIdentity;
use crate::store::{CredentialStore, DeviceRecord, StoreError};
use crate::wire::{AuthChallenge, AuthClaim};
use crate::{Error, Result, commands, crypto};

/// Where an authentication handshake stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Nothing sent yet
    Idle,
    /// SELECT succeeded
    ApplicationSelected,
    /// Challenge sent
    ChallengeSent,
    /// The token's claim was received in full
    ResponseReceived,
    /// Signature checked out
    Verified,
    /// Token turned away
    Rejected,
}

/// Why a token was turned away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// No record for the claimed user id
    UnknownUser(String),
    /// The signature does not match the stored key
    InvalidSignature(String),
    /// The token has never registered with this reader
    ReaderNotRegistered,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownUser(user_id) => write!(f, "unknown user {user_id}"),
            Self::InvalidSignature(user_id) => write!(f, "invalid signature for user {user_id}"),
            Self::ReaderNotRegistered => f.write_str("token does not know this reader"),
        }
    }
}

/// Result of one authentication presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The token proved possession of the registered key
    Verified {
        /// Authenticated user id
        user_id: String,
        /// Name stored at registration
        user_name: String,
    },
    /// The token was turned away
    Rejected(RejectReason),
}

/// One authentication handshake against a presented token
#[derive(Debug)]
pub struct Authentication<'a, S: CredentialStore + ?Sized> {
    identity: &'a ReaderIdentity,
    store: &'a S,
    reassembler: ChunkReassembler,
    state: AuthState,
}

impl<'a, S: CredentialStore + ?Sized> Authentication<'a, S> {
    /// Prepare a handshake for `identity`, checking against `store`
    pub const fn new(
        identity: &'a ReaderIdentity,
        store: &'a S,
        reassembler: ChunkReassembler,
    ) -> Self {
        Self {
            identity,
            store,
            reassembler,
            state: AuthState::Idle,
        }
    }

    /// Current state
    pub const fn state(&self) -> AuthState {
        self.state
    }

    fn transition(&mut self, next: AuthState) {
        debug!(from = ?self.state, to = ?next, "Authentication state");
        self.state = next;
    }

    fn reject(&mut self, reason: RejectReason) -> Result<AuthOutcome> {
        self.transition(AuthState::Rejected);
        info!(%reason, "Authentication rejected");
        Ok(AuthOutcome::Rejected(reason))
    }

    /// Run the handshake to completion
    #[instrument(name = "authentication", skip_all, fields(reader_id = %self.identity.reader_id))]
    pub fn run(&mut self, transport: &mut dyn CardTransport) -> Result<AuthOutcome> {
        self.state = AuthState::Idle;

        commands::select_application(transport, &self.identity.application_id)?;
        self.transition(AuthState::ApplicationSelected);

        let nonce = crypto::generate_nonce(self.identity.nonce_length);
        let request = AuthChallenge::new(self.identity, nonce).to_bytes()?;
        let response = transport.transmit(&commands::authentication_request(request.clone())?)?;
        self.transition(AuthState::ChallengeSent);

        let payload = match response.status().clone() {
            ResponseStatus::Success => response.into_payload(),
            ResponseStatus::Continue(_) => self.reassembler.collect(transport, response)?,
            ResponseStatus::Failure(_) => {
                return match response.status_word() {
                    Some(sw) if sw.is_reader_not_registered() => {
                        self.reject(RejectReason::ReaderNotRegistered)
                    }
                    Some(sw) if sw.is_user_verification_required() => {
                        Err(Error::UserVerificationRequired)
                    }
                    _ => Err(Error::AuthenticationRequestFailed {
                        status: Bytes::from(response),
                    }),
                };
            }
        };
        self.transition(AuthState::ResponseReceived);

        let claim = AuthClaim::parse(&payload)?;
        let record = match self.store.get_record(&claim.user_id) {
            Ok(record) => record,
            Err(StoreError::NotFound(user_id)) => {
                notify_user_not_registered(transport);
                return self.reject(RejectReason::UnknownUser(user_id));
            }
            Err(e) => return Err(e.into()),
        };

        if verify_claim(&request, &claim, &record)? {
            self.transition(AuthState::Verified);
            info!(user_id = %record.user_id, user_name = %record.user_name, "Authentication verified");
            Ok(AuthOutcome::Verified {
                user_id: record.user_id,
                user_name: record.user_name,
            })
        } else {
            self.reject(RejectReason::InvalidSignature(claim.user_id))
        }
    }
}

/// Check the claimed signature over `request || user_id`
fn verify_claim(request: &[u8], claim: &AuthClaim, record: &DeviceRecord) -> Result<bool> {
    let mut message = BytesMut::with_capacity(request.len() + claim.user_id.len());
    message.extend_from_slice(request);
    message.extend_from_slice(claim.user_id.as_bytes());

    Ok(crypto::verify(&message, &claim.signature, &record.public_key)?)
}

/// Best effort; the token only uses this to inform its holder
fn notify_user_not_registered(transport: &mut dyn CardTransport) {
    match transport.transmit(&commands::user_not_registered()) {
        Ok(response) if response.is_success() => debug!("Token notified of unknown user"),
        Ok(response) => debug!(status = ?response.status(), "Token refused unknown user notification"),
        Err(e) => debug!(error = %e, "Failed to notify token of unknown user"),
    }
}
