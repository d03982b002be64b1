//! PC/SC transport for the nfcauth reader
//!
//! This crate implements [`CardTransport`](nfcauth_apdu_core::CardTransport) on top
//! of the PC/SC API, so any CCID contactless reader the system's PC/SC daemon
//! knows about can carry the authentication protocol.
//!
//! ```no_run
//! use nfcauth_apdu_core::prelude::*;
//! use nfcauth_apdu_transport_pcsc::{ConnectStrategy, PcscConfig, PcscDeviceManager};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = PcscDeviceManager::new()?;
//! let mut transport =
//!     manager.connect_strategy(ConnectStrategy::FirstAvailable, PcscConfig::default())?;
//!
//! if let Some(token) = transport.poll_token()? {
//!     println!("token on {}: {:?}", token.reader, token.atr);
//! }
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod error;
mod manager;
mod reader;
mod transport;

pub use config::{ConnectStrategy, PcscConfig, ShareMode};
pub use error::PcscError;
pub use manager::PcscDeviceManager;
pub use reader::PcscReader;
pub use transport::PcscTransport;

// Re-export some pcsc types for convenience
pub use pcsc::{Protocol, Protocols};
