//! Registration handshake
//!
//! Binds a token-generated public key to a user id: SELECT, send the reader's
//! identity, receive the token's claim, store it, then acknowledge with
//! registration complete. A record written before the acknowledgment fails is
//! deleted again, so a handshake leaves either one record or none.

use nfcauth_apdu_core::prelude::*;
use tracing::{debug, error, info, instrument};

use crate::commands;
use crate::config::ReaderIdentity;
use crate::store::{CredentialStore, DeviceRecord, StoreError};
use crate::wire::{RegistrationClaim, RegistrationRequest};
use crate::{Error, Result};

/// Where a registration handshake stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// Nothing sent yet
    Idle,
    /// SELECT succeeded
    ApplicationSelected,
    /// Registration request sent
    RequestSent,
    /// The token's claim was received in full
    ResponseReceived,
    /// The token accepted the request but has no answer yet
    DeferredAck,
    /// Record written and acknowledged
    Completed,
    /// Record written, acknowledgment failed, record deleted
    RolledBack,
}

/// Result of one registration presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The token is registered
    Completed(DeviceRecord),
    /// The token is still processing; present it again
    Deferred,
}

/// Deletes a freshly written record unless committed
struct PendingRecord<'a, S: CredentialStore + ?Sized> {
    store: &'a S,
    user_id: &'a str,
    committed: bool,
}

impl<'a, S: CredentialStore + ?Sized> PendingRecord<'a, S> {
    fn create(store: &'a S, record: &'a DeviceRecord) -> Result<Self> {
        store.create(record).map_err(|e| match e {
            StoreError::DuplicateKey(user_id) => Error::AlreadyRegistered(user_id),
            other => Error::Store(other),
        })?;
        debug!(user_id = %record.user_id, "Record written, awaiting acknowledgment");
        Ok(Self {
            store,
            user_id: &record.user_id,
            committed: false,
        })
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl<S: CredentialStore + ?Sized> Drop for PendingRecord<'_, S> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match self.store.delete(self.user_id) {
            Ok(_) => info!(user_id = %self.user_id, "Rolled back registration"),
            Err(e) => error!(user_id = %self.user_id, error = %e, "Failed to roll back registration"),
        }
    }
}

/// One registration handshake against a presented token
#[derive(Debug)]
pub struct Registration<'a, S: CredentialStore + ?Sized> {
    identity: &'a ReaderIdentity,
    store: &'a S,
    reassembler: ChunkReassembler,
    state: RegistrationState,
}

impl<'a, S: CredentialStore + ?Sized> Registration<'a, S> {
    /// Prepare a handshake for `identity`, writing into `store`
    pub const fn new(
        identity: &'a ReaderIdentity,
        store: &'a S,
        reassembler: ChunkReassembler,
    ) -> Self {
        Self {
            identity,
            store,
            reassembler,
            state: RegistrationState::Idle,
        }
    }

    /// Current state
    pub const fn state(&self) -> RegistrationState {
        self.state
    }

    fn transition(&mut self, next: RegistrationState) {
        debug!(from = ?self.state, to = ?next, "Registration state");
        self.state = next;
    }

    /// Run the handshake to completion
    #[instrument(name = "registration", skip_all, fields(reader_id = %self.identity.reader_id))]
    pub fn run(&mut self, transport: &mut dyn CardTransport) -> Result<RegistrationOutcome> {
        self.state = RegistrationState::Idle;

        commands::select_application(transport, &self.identity.application_id)?;
        self.transition(RegistrationState::ApplicationSelected);

        let Some(payload) = self.send_request(transport)? else {
            self.transition(RegistrationState::DeferredAck);
            info!("Token is still processing the registration request");
            return Ok(RegistrationOutcome::Deferred);
        };
        self.transition(RegistrationState::ResponseReceived);

        let claim = self.process_response(&payload)?;
        let record = DeviceRecord::new(claim.user_id, claim.user_name, claim.public_key);

        let pending = PendingRecord::create(self.store, &record)?;
        if let Err(e) = Self::send_complete(transport) {
            drop(pending);
            self.transition(RegistrationState::RolledBack);
            return Err(e);
        }
        pending.commit();
        self.transition(RegistrationState::Completed);

        info!(user_id = %record.user_id, user_name = %record.user_name, "Registration completed");
        Ok(RegistrationOutcome::Completed(record))
    }

    /// Send the reader identity; `None` means the token deferred its answer
    fn send_request(&mut self, transport: &mut dyn CardTransport) -> Result<Option<Bytes>> {
        let body = RegistrationRequest::new(self.identity).to_bytes()?;
        let response = transport.transmit(&commands::registration_request(body)?)?;
        self.transition(RegistrationState::RequestSent);

        match response.status().clone() {
            ResponseStatus::Success if response.payload().is_empty() => Ok(None),
            ResponseStatus::Continue(_) => Ok(Some(self.reassembler.collect(transport, response)?)),
            ResponseStatus::Success | ResponseStatus::Failure(_) => {
                Err(Error::RegistrationRequestFailed {
                    status: Bytes::from(response),
                })
            }
        }
    }

    fn process_response(&self, payload: &[u8]) -> Result<RegistrationClaim> {
        let claim = RegistrationClaim::parse(payload)?;

        if claim.reader_id != self.identity.reader_id {
            return Err(Error::IdentityMismatch {
                expected: self.identity.reader_id.clone(),
                actual: claim.reader_id,
            });
        }

        debug!(user_id = %claim.user_id, "Registration claim accepted");
        Ok(claim)
    }

    fn send_complete(transport: &mut dyn CardTransport) -> Result<()> {
        let response = transport.transmit(&commands::registration_complete())?;
        if response.is_success() {
            Ok(())
        } else {
            Err(Error::RegistrationCompleteFailed {
                status: Bytes::from(response),
            })
        }
    }
}
