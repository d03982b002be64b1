//! PC/SC transport implementation

use std::ffi::CString;
use std::fmt;
use std::time::Duration;

use nfcauth_apdu_core::prelude::*;
use pcsc::{Card, Context, Disposition, ReaderState, State};
use tracing::{debug, trace};

use crate::reader::card_present;
use crate::{config::PcscConfig, error::PcscError};

/// Transport implementation using PC/SC
pub struct PcscTransport {
    /// PC/SC context
    context: Context,
    /// Token connection, if established
    card: Option<Card>,
    /// Reader name
    reader_name: String,
    /// Reader name as handed to the PC/SC API
    reader_cstr: CString,
    /// Configuration
    config: PcscConfig,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl PcscTransport {
    /// Create a new PC/SC transport for the specified reader
    pub(crate) fn new(
        context: Context,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<Self, PcscError> {
        let reader_cstr = CString::new(reader_name)
            .map_err(|_| PcscError::ReaderNotFound(reader_name.to_string()))?;

        Ok(Self {
            context,
            card: None,
            reader_name: reader_name.to_string(),
            reader_cstr,
            config,
        })
    }

    /// Try to connect to the token
    fn connect_card(&mut self) -> Result<(), PcscError> {
        if self.card.is_some() {
            return Ok(());
        }

        match self.context.connect(
            &self.reader_cstr,
            self.config.share_mode.into(),
            self.config.protocols,
        ) {
            Ok(card) => {
                debug!(reader = %self.reader_name, "Connected to token");
                self.card = Some(card);
                Ok(())
            }
            Err(pcsc::Error::NoSmartcard) => Err(PcscError::NoCard(self.reader_name.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Current state of the reader slot, without waiting for a change
    fn reader_state(&self) -> Result<Option<ReaderState>, PcscError> {
        let mut states = [ReaderState::new(self.reader_cstr.clone(), State::UNAWARE)];
        match self.context.get_status_change(Duration::ZERO, &mut states) {
            Ok(()) => {
                let [state] = states;
                Ok(Some(state))
            }
            Err(pcsc::Error::Timeout) => Ok(None),
            Err(pcsc::Error::UnknownReader) => {
                Err(PcscError::ReaderNotFound(self.reader_name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get the reader name
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    /// Check if the transport is connected to a token
    pub const fn has_card(&self) -> bool {
        self.card.is_some()
    }

    /// Transmit a frame to the token
    fn transmit_frame(&mut self, frame: &[u8], retried: bool) -> Result<Bytes, PcscError> {
        self.connect_card()?;

        let card = match &mut self.card {
            Some(card) => card,
            None => return Err(PcscError::NoCard(self.reader_name.clone())),
        };

        let mut response_buffer = [0u8; MAX_RESPONSE_LEN];

        match card.transmit(frame, &mut response_buffer) {
            Ok(response) => Ok(Bytes::copy_from_slice(response)),
            Err(e) => {
                // A reset or removed token invalidates the handle
                if matches!(e, pcsc::Error::ResetCard | pcsc::Error::RemovedCard) {
                    self.card = None;

                    if self.config.auto_reconnect && e == pcsc::Error::ResetCard && !retried {
                        debug!(reader = %self.reader_name, "Token was reset, reconnecting");
                        if self.connect_card().is_ok() {
                            return self.transmit_frame(frame, true);
                        }
                    }
                }

                Err(e.into())
            }
        }
    }
}

impl CardTransport for PcscTransport {
    fn do_exchange(
        &mut self,
        frame: &[u8],
        _max_response_len: usize,
    ) -> Result<Bytes, TransportError> {
        self.transmit_frame(frame, false).map_err(TransportError::from)
    }

    fn poll_token(&mut self) -> Result<Option<TokenInfo>, TransportError> {
        let Some(state) = self.reader_state()? else {
            return Ok(None);
        };

        if !card_present(state.event_state()) {
            if self.card.take().is_some() {
                trace!(reader = %self.reader_name, "Token left the field");
            }
            return Ok(None);
        }

        match self.connect_card() {
            Ok(()) => Ok(Some(TokenInfo {
                reader: self.reader_name.clone(),
                atr: Bytes::copy_from_slice(state.atr()),
            })),
            // Token left between the status query and the connect
            Err(PcscError::NoCard(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn is_connected(&self) -> bool {
        self.card.is_some()
    }

    fn release(&mut self) -> Result<(), TransportError> {
        if let Some(card) = self.card.take() {
            card.disconnect(Disposition::LeaveCard)
                .map_err(|(_, e)| TransportError::from(PcscError::from(e)))?;
        }
        Ok(())
    }
}

impl Drop for PcscTransport {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            let _ = card.disconnect(Disposition::LeaveCard);
        }
    }
}
