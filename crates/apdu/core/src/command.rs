//! APDU command frames
//!
//! A command is a four byte header (CLA, INS, P1, P2), an optional data field
//! prefixed by its length byte (Lc), and an optional expected response length (Le).
//! Only short APDUs are produced: the data field is capped at [`MAX_DATA_LEN`] bytes.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

/// Maximum number of data bytes carried by a single command frame
pub const MAX_DATA_LEN: usize = 254;

/// Error for APDU command construction and parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Data field exceeds the frame capacity
    #[error("Data too long: {0} bytes (max {1})")]
    DataTooLong(usize, usize),

    /// Raw bytes do not form a valid short APDU
    #[error("Invalid command length: {0}")]
    InvalidLength(usize),
}

impl CommandError {
    /// Create a data too long error
    pub const fn data_too_long(actual: usize) -> Self {
        Self::DataTooLong(actual, MAX_DATA_LEN)
    }
}

/// Generic APDU command structure
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    cla: u8,
    /// Instruction byte
    ins: u8,
    /// Parameter 1
    p1: u8,
    /// Parameter 2
    p2: u8,
    /// Command data (optional)
    data: Option<Bytes>,
    /// Expected length (optional)
    le: Option<u8>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with expected response length (Le)
    pub const fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: Some(le),
        }
    }

    /// Attach a data field, failing if it does not fit in one frame
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Result<Self, CommandError> {
        let data = data.into();
        if data.len() > MAX_DATA_LEN {
            return Err(CommandError::data_too_long(data.len()));
        }
        self.data = Some(data);
        Ok(self)
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Command class (CLA)
    pub const fn class(&self) -> u8 {
        self.cla
    }

    /// Instruction code (INS)
    pub const fn instruction(&self) -> u8 {
        self.ins
    }

    /// First parameter (P1)
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Second parameter (P2)
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Header bytes as sent on the wire
    pub const fn header(&self) -> [u8; 4] {
        [self.cla, self.ins, self.p1, self.p2]
    }

    /// Command payload data (optional)
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Expected response length (optional)
    pub const fn expected_length(&self) -> Option<u8> {
        self.le
    }

    /// Largest raw response this command may produce, status word included
    ///
    /// Commands without Le may answer with anything up to the link maximum.
    pub const fn response_capacity(&self) -> usize {
        match self.le {
            Some(0) => 256 + 2,
            Some(le) => le as usize + 2,
            None => crate::transport::MAX_RESPONSE_LEN,
        }
    }

    /// Calculate length of serialized command
    pub fn command_length(&self) -> usize {
        4 + self.data.as_ref().map_or(0, |d| 1 + d.len()) + usize::from(self.le.is_some())
    }

    /// Convert to raw APDU bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        buffer.put_slice(&self.header());

        if let Some(data) = &self.data {
            // Length checked in `with_data`
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }

    /// Parse a command from raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, CommandError> {
        if data.len() < 4 {
            return Err(CommandError::InvalidLength(data.len()));
        }

        let mut command = Self::new(data[0], data[1], data[2], data[3]);

        match data.len() {
            4 => {}
            // Only Le present, no data
            5 => command.le = Some(data[4]),
            len => {
                let lc = data[4] as usize;
                if lc > MAX_DATA_LEN {
                    return Err(CommandError::data_too_long(lc));
                }
                let end = 5 + lc;
                if len < end {
                    return Err(CommandError::InvalidLength(len));
                }
                command.data = Some(Bytes::copy_from_slice(&data[5..end]));
                match len - end {
                    0 => {}
                    1 => command.le = Some(data[end]),
                    _ => return Err(CommandError::InvalidLength(len)),
                }
            }
        }

        Ok(command)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("header", &hex::encode(self.header()))
            .field("data", &self.data.as_ref().map(hex::encode))
            .field("le", &self.le)
            .finish()
    }
}

impl From<&Command> for Bytes {
    fn from(command: &Command) -> Self {
        command.to_bytes()
    }
}
