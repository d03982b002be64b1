//! Response frames from the token
//!
//! A raw response is an optional payload followed by a two byte status word.
//! Parsing never fails: anything that is not `90 00` or `61 XX` becomes a
//! [`ResponseStatus::Failure`] carrying the raw bytes for diagnostics.

pub mod status;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use status::StatusWord;

/// Status indicator derived from the tail of a raw response
#[derive(Clone, PartialEq, Eq)]
pub enum ResponseStatus {
    /// `90 00`
    Success,
    /// `61 XX`, carrying the size hint of the next fragment
    Continue(u8),
    /// Any other status, or a frame too short to carry one
    Failure(Bytes),
}

impl ResponseStatus {
    /// Classify a status word
    const fn classify(sw: StatusWord) -> Option<Self> {
        match (sw.sw1, sw.sw2) {
            (0x90, 0x00) => Some(Self::Success),
            (0x61, hint) => Some(Self::Continue(hint)),
            _ => None,
        }
    }
}

impl fmt::Debug for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::Continue(hint) => f.debug_tuple("Continue").field(hint).finish(),
            Self::Failure(raw) => f.debug_tuple("Failure").field(&hex::encode(raw)).finish(),
        }
    }
}

/// A parsed token response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: ResponseStatus,
    payload: Bytes,
}

impl Response {
    /// Create a success response carrying `payload`
    pub fn success(payload: impl Into<Bytes>) -> Self {
        Self {
            status: ResponseStatus::Success,
            payload: payload.into(),
        }
    }

    /// Split a raw frame into status and payload
    pub fn from_bytes(raw: Bytes) -> Self {
        if raw.len() < 2 {
            trace!(raw = %hex::encode(&raw), "Response too short for a status word");
            return Self {
                status: ResponseStatus::Failure(raw),
                payload: Bytes::new(),
            };
        }

        let split = raw.len() - 2;
        let sw = StatusWord::new(raw[split], raw[split + 1]);

        let response = match ResponseStatus::classify(sw) {
            Some(status) => Self {
                status,
                payload: raw.slice(..split),
            },
            None => Self {
                status: ResponseStatus::Failure(raw),
                payload: Bytes::new(),
            },
        };

        trace!(
            sw1 = format_args!("{:#04x}", sw.sw1),
            sw2 = format_args!("{:#04x}", sw.sw2),
            payload_len = response.payload.len(),
            "Parsed response"
        );

        response
    }

    /// The status indicator
    pub const fn status(&self) -> &ResponseStatus {
        &self.status
    }

    /// Payload fragment (empty for failures)
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the response and return its payload
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Whether the status is `90 00`
    pub const fn is_success(&self) -> bool {
        matches!(self.status, ResponseStatus::Success)
    }

    /// The trailing status word, if the frame carried one
    pub fn status_word(&self) -> Option<StatusWord> {
        match &self.status {
            ResponseStatus::Success => Some(status::common::SUCCESS),
            ResponseStatus::Continue(hint) => Some(StatusWord::new(0x61, *hint)),
            ResponseStatus::Failure(raw) if raw.len() >= 2 => {
                Some(StatusWord::new(raw[raw.len() - 2], raw[raw.len() - 1]))
            }
            ResponseStatus::Failure(_) => None,
        }
    }
}

impl From<Bytes> for Response {
    fn from(raw: Bytes) -> Self {
        Self::from_bytes(raw)
    }
}

impl From<Response> for Bytes {
    fn from(response: Response) -> Self {
        match response.status {
            ResponseStatus::Failure(raw) => raw,
            ResponseStatus::Success | ResponseStatus::Continue(_) => {
                let mut buf = BytesMut::with_capacity(response.payload.len() + 2);
                buf.put_slice(&response.payload);
                match response.status {
                    ResponseStatus::Continue(hint) => buf.put_slice(&[0x61, hint]),
                    _ => buf.put_slice(&[0x90, 0x00]),
                }
                buf.freeze()
            }
        }
    }
}
