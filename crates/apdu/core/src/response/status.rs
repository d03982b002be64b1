//! Status word definitions for token responses

use std::fmt;

/// Status Word (SW1-SW2) trailing every token response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Create from a u16 value (SW1 | SW2)
    pub const fn from_u16(status: u16) -> Self {
        Self {
            sw1: (status >> 8) as u8,
            sw2: status as u8,
        }
    }

    /// Convert to a u16 value (SW1 | SW2)
    pub const fn to_u16(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Raw bytes as they appear on the wire
    pub const fn to_bytes(&self) -> [u8; 2] {
        [self.sw1, self.sw2]
    }

    /// `90 00`
    pub const fn is_success(&self) -> bool {
        self.to_u16() == common::SUCCESS.to_u16()
    }

    /// `61 XX`: another fragment of the response is waiting
    pub const fn is_more_data_available(&self) -> bool {
        self.sw1 == 0x61
    }

    /// `69 83`: the token holds no registration for this reader
    pub const fn is_reader_not_registered(&self) -> bool {
        self.to_u16() == common::READER_NOT_REGISTERED.to_u16()
    }

    /// `63 00`: the token wants the user to unlock it first
    pub const fn is_user_verification_required(&self) -> bool {
        self.to_u16() == common::USER_VERIFICATION_REQUIRED.to_u16()
    }

    /// Get a description of this status word
    pub const fn description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "Success",
            (0x61, _) => "More data available",
            (0x63, 0x00) => "User verification required",
            (0x67, 0x00) => "Wrong length",
            (0x69, 0x82) => "Security status not satisfied",
            (0x69, 0x83) => "Reader not registered",
            (0x69, 0x85) => "Conditions of use not satisfied",
            (0x6A, 0x82) => "Application not found",
            (0x6A, 0x86) => "Incorrect parameters P1-P2",
            (0x6D, 0x00) => "Instruction code not supported or invalid",
            (0x6E, 0x00) => "Class not supported",
            (0x6F, 0x00) => "No precise diagnosis",
            (0x00, 0x00) => "Unknown command",
            _ => "Unknown status word",
        }
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from(tuple: (u8, u8)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

impl From<u16> for StatusWord {
    fn from(status: u16) -> Self {
        Self::from_u16(status)
    }
}

impl From<StatusWord> for u16 {
    fn from(status: StatusWord) -> Self {
        status.to_u16()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X} ({})", self.sw1, self.sw2, self.description())
    }
}

/// Status words spoken by the authenticator application
pub mod common {
    use super::StatusWord;

    /// Success (90 00)
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);

    /// Biometric or PIN unlock needed before the token will answer (63 00)
    pub const USER_VERIFICATION_REQUIRED: StatusWord = StatusWord::new(0x63, 0x00);

    /// Token does not know the requesting reader (69 83)
    pub const READER_NOT_REGISTERED: StatusWord = StatusWord::new(0x69, 0x83);
}
