//! Reader side of the nfcauth device authentication protocol
//!
//! A token (typically a phone emulating a contactless card) first registers with
//! the reader, handing over a public key bound to its holder's user id. Later
//! presentations prove possession of the matching private key by signing a
//! fresh challenge.
//!
//! - [`Registration`] and [`Authentication`] run one handshake each against a
//!   [`CardTransport`](nfcauth_apdu_core::CardTransport)
//! - [`Session`] polls for tokens and dispatches to them
//! - [`CredentialStore`] keeps registered keys; [`MemoryStore`] and
//!   [`JsonFileStore`] are provided
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod authentication;
pub mod commands;
pub mod config;
pub mod crypto;
mod error;
pub mod registration;
pub mod session;
pub mod stop;
pub mod store;
pub mod wire;

pub use authentication::{AuthOutcome, AuthState, Authentication, RejectReason};
pub use config::{AuthMode, ConfigError, ReaderConfig, ReaderIdentity, SessionConfig};
pub use crypto::VerificationError;
pub use error::{Error, ErrorKind, Result};
pub use registration::{Registration, RegistrationOutcome, RegistrationState};
pub use session::{Mode, Presentation, Session, SessionOutcome};
pub use stop::{StopHandle, StopToken, stop_pair};
pub use store::{CredentialStore, DeviceRecord, JsonFileStore, MemoryStore, StoreError};
