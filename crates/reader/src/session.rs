//! The session loop
//!
//! Polls the transport for a token, runs one handshake per presentation and
//! keeps going until the requested mode resolves or a stop is requested. Errors
//! inside a handshake are logged once; a token that stays in the field after a
//! failed handshake is left alone until it is removed and presented again.
//! Deferred registration answers are the exception and are polled again.

use nfcauth_apdu_core::{CardTransport, ChunkReassembler};
use tracing::{debug, error, info, warn};

use crate::authentication::{AuthOutcome, Authentication};
use crate::config::ReaderConfig;
use crate::registration::{Registration, RegistrationOutcome};
use crate::stop::StopToken;
use crate::store::{CredentialStore, DeviceRecord};
use crate::{Error, ErrorKind, Result};

/// Which handshake the session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Register new tokens
    Register,
    /// Authenticate registered tokens
    Authenticate,
}

/// Result of a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    /// The field was empty
    NoToken,
    /// The token of a failed handshake is still in the field
    AwaitingRemoval,
    /// A registration handshake ran
    Registration(RegistrationOutcome),
    /// An authentication handshake ran
    Authentication(AuthOutcome),
}

/// Why [`Session::run`] returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A token was registered
    Registered(DeviceRecord),
    /// An authentication attempt resolved
    Authentication(AuthOutcome),
    /// A stop was requested
    Stopped,
}

/// A reader bound to one transport and one credential store
#[derive(Debug)]
pub struct Session<T, S> {
    config: ReaderConfig,
    transport: T,
    store: S,
    stop: StopToken,
    awaiting_removal: bool,
}

impl<T: CardTransport, S: CredentialStore> Session<T, S> {
    /// Create a session
    pub const fn new(config: ReaderConfig, transport: T, store: S, stop: StopToken) -> Self {
        Self {
            config,
            transport,
            store,
            stop,
            awaiting_removal: false,
        }
    }

    /// The session configuration
    pub const fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// The credential store
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Take the session apart
    pub fn into_parts(self) -> (T, S) {
        (self.transport, self.store)
    }

    /// Poll once and run a handshake if a new presentation is in the field
    ///
    /// After a handshake fails, the token has to leave the field before the
    /// next one runs.
    pub fn run_once(&mut self, mode: Mode) -> Result<Presentation> {
        let Some(token) = self.transport.poll_token()? else {
            if self.awaiting_removal {
                debug!("Token removed");
                self.awaiting_removal = false;
            }
            return Ok(Presentation::NoToken);
        };
        if self.awaiting_removal {
            return Ok(Presentation::AwaitingRemoval);
        }
        info!(reader = %token.reader, atr = %hex::encode(&token.atr), "Token detected");

        let result = self.handshake(mode);
        self.awaiting_removal = result.is_err();
        result
    }

    fn handshake(&mut self, mode: Mode) -> Result<Presentation> {
        let reassembler = ChunkReassembler::new(self.config.session.max_response_chunks);
        match mode {
            Mode::Register => Registration::new(&self.config.reader, &self.store, reassembler)
                .run(&mut self.transport)
                .map(Presentation::Registration),
            Mode::Authenticate => Authentication::new(&self.config.reader, &self.store, reassembler)
                .run(&mut self.transport)
                .map(Presentation::Authentication),
        }
    }

    /// Run until the mode resolves, a fatal error occurs or a stop is requested
    ///
    /// The transport is released before returning.
    pub fn run(&mut self, mode: Mode) -> Result<SessionOutcome> {
        info!(?mode, reader_id = %self.config.reader.reader_id, "Waiting for a token");
        let result = self.poll_loop(mode);

        if let Err(e) = self.transport.release() {
            warn!(error = %e, "Failed to release transport");
        }
        result
    }

    fn poll_loop(&mut self, mode: Mode) -> Result<SessionOutcome> {
        let poll_interval = self.config.session.poll_interval();
        let retry_delay = self.config.session.retry_delay();
        let max_deferred = self.config.session.max_deferred_polls;
        let mut deferred = 0u32;

        loop {
            if self.stop.is_stopped() {
                return Ok(SessionOutcome::Stopped);
            }

            let pause = match self.run_once(mode) {
                Ok(Presentation::NoToken | Presentation::AwaitingRemoval) => poll_interval,
                Ok(Presentation::Registration(RegistrationOutcome::Completed(record))) => {
                    return Ok(SessionOutcome::Registered(record));
                }
                Ok(Presentation::Registration(RegistrationOutcome::Deferred)) => {
                    deferred += 1;
                    if deferred > max_deferred {
                        return Err(Error::RegistrationTimedOut { attempts: deferred });
                    }
                    retry_delay
                }
                Ok(Presentation::Authentication(outcome)) => {
                    return Ok(SessionOutcome::Authentication(outcome));
                }
                Err(e) if e.is_retryable() => {
                    deferred = 0;
                    log_failure(&e);
                    retry_delay
                }
                Err(e) => {
                    error!(error = %e, kind = %e.kind(), "Session aborted");
                    return Err(e);
                }
            };

            if self.stop.wait(pause) {
                info!("Stop requested");
                return Ok(SessionOutcome::Stopped);
            }
        }
    }
}

fn log_failure(e: &Error) {
    let kind = e.kind();
    match kind {
        ErrorKind::Adverse | ErrorKind::Malformed => {
            info!(error = %e, %kind, "Handshake failed");
        }
        ErrorKind::Link | ErrorKind::ProtocolViolation => {
            warn!(error = %e, %kind, "Handshake failed");
        }
        ErrorKind::Verification | ErrorKind::Store | ErrorKind::Config => {
            error!(error = %e, %kind, "Handshake failed");
        }
    }
}
