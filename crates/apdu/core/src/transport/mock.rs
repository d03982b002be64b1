//! Scripted token for tests

use std::collections::VecDeque;

use bytes::{BufMut, Bytes, BytesMut};

use super::{CardTransport, TokenInfo, TransportError};
use crate::Command;

/// A transport that replays a fixed script of responses
///
/// Like a token that keeps answering the same way, the last scripted response is
/// repeated once it is the only one left. Call [`MockTransport::exhaustible`] to
/// have the token leave the field when the script runs out instead.
#[derive(Debug, Clone)]
pub struct MockTransport {
    /// Responses still to be returned, in order
    pub responses: VecDeque<Result<Bytes, TransportError>>,
    /// Every frame that was sent
    pub commands: Vec<Bytes>,
    /// Whether a token is in the field
    pub present: bool,
    /// Scripted answers to `poll_token`, overriding `present` while they last
    pub presence: VecDeque<bool>,
    /// Whether the transport holds a connection
    pub connected: bool,
    /// Number of `release` calls
    pub releases: usize,
    repeat_last: bool,
    echo: bool,
}

impl MockTransport {
    /// Create a new mock transport with the given responses
    pub fn new(responses: impl IntoIterator<Item = Bytes>) -> Self {
        Self {
            responses: responses.into_iter().map(Ok).collect(),
            commands: Vec::new(),
            present: true,
            presence: VecDeque::new(),
            connected: true,
            releases: 0,
            repeat_last: true,
            echo: false,
        }
    }

    /// Create a new mock transport that always returns the given response
    pub fn with_response(response: Bytes) -> Self {
        Self::new([response])
    }

    /// Create a new mock transport that always returns success (90 00)
    pub fn with_success() -> Self {
        Self::with_response(Bytes::from_static(&[0x90, 0x00]))
    }

    /// A token that answers every command with its own data field and `90 00`
    pub fn echo() -> Self {
        Self {
            echo: true,
            ..Self::new([])
        }
    }

    /// Stop repeating the final response; an empty script means the token left
    pub const fn exhaustible(mut self) -> Self {
        self.repeat_last = false;
        self
    }

    /// Start with no token in the field
    pub const fn absent(mut self) -> Self {
        self.present = false;
        self.connected = false;
        self
    }

    /// Script whether the token is in the field at each poll
    ///
    /// Once the script runs out the last scripted value sticks.
    pub fn with_presence(mut self, presence: impl IntoIterator<Item = bool>) -> Self {
        self.presence = presence.into_iter().collect();
        self
    }

    /// Append a response to the script
    pub fn push_response(&mut self, response: impl Into<Bytes>) -> &mut Self {
        self.responses.push_back(Ok(response.into()));
        self
    }

    /// Append a link failure to the script
    pub fn push_error(&mut self, error: TransportError) -> &mut Self {
        self.responses.push_back(Err(error));
        self
    }

    /// Frames sent so far, hex encoded
    pub fn sent_hex(&self) -> Vec<String> {
        self.commands.iter().map(hex::encode).collect()
    }

    fn echo_response(frame: &[u8]) -> Result<Bytes, TransportError> {
        let command =
            Command::from_bytes(frame).map_err(|e| TransportError::other(e.to_string()))?;
        let data = command.data().unwrap_or_default();
        let mut buf = BytesMut::with_capacity(data.len() + 2);
        buf.put_slice(data);
        buf.put_slice(&[0x90, 0x00]);
        Ok(buf.freeze())
    }

    fn has_script(&self) -> bool {
        self.echo || !self.responses.is_empty()
    }
}

impl CardTransport for MockTransport {
    fn do_exchange(
        &mut self,
        frame: &[u8],
        _max_response_len: usize,
    ) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::NoToken);
        }

        self.commands.push(Bytes::copy_from_slice(frame));

        if self.echo {
            return Self::echo_response(frame);
        }

        // Either clone the single response or take the next one
        if self.repeat_last && self.responses.len() == 1 {
            return self.responses[0].clone();
        }
        match self.responses.pop_front() {
            Some(response) => response,
            None => {
                self.connected = false;
                self.present = false;
                Err(TransportError::NoToken)
            }
        }
    }

    fn poll_token(&mut self) -> Result<Option<TokenInfo>, TransportError> {
        if let Some(present) = self.presence.pop_front() {
            self.present = present;
        }
        if !self.present || !self.has_script() {
            self.connected = false;
            return Ok(None);
        }
        self.connected = true;
        Ok(Some(TokenInfo {
            reader: "Mock Reader 00".to_string(),
            atr: Bytes::from_static(&[0x3B, 0x80, 0x80, 0x01, 0x01]),
        }))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn release(&mut self) -> Result<(), TransportError> {
        self.releases += 1;
        self.connected = false;
        Ok(())
    }
}
