//! Status words and their translation into the card error taxonomy.

use std::fmt;

/// Two-byte status word trailing every card response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte
    pub sw1: u8,
    /// Second status byte
    pub sw2: u8,
}

impl StatusWord {
    /// Create a status word from its two bytes
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// The status word as a single big-endian value
    pub const fn to_u16(self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }

    /// Whether the card reported normal completion
    pub const fn is_success(self) -> bool {
        // 61xx signals further response bytes, not a failure
        matches!(self.sw1, 0x90 | 0x61) && (self.sw1 != 0x90 || self.sw2 == 0x00)
    }

    /// Translate the status word into the error taxonomy.
    ///
    /// Always runs before any response payload is interpreted; a successful
    /// transmit still fails here when the card reported an error.
    pub fn check(self) -> Result<(), CardError> {
        if self.is_success() {
            return Ok(());
        }
        Err(match (self.sw1, self.sw2) {
            (0x67, 0x00) => CardError::WrongLength,
            (0x65, 0x81) => CardError::MemoryFailure,
            (0x69, 0x82) => CardError::SecurityStatusNotSatisfied,
            (0x69, 0x83) => CardError::AuthenticationMethodBlocked,
            (0x69, 0x86) => CardError::NotAllowed,
            (0x6A, 0x82) => CardError::FileNotFound,
            (0x6A, 0x86) | (0x6B, 0x00) => CardError::IncorrectParameters,
            _ => CardError::Unknown(self),
        })
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}", self.sw1, self.sw2)
    }
}

/// Well-known status words
pub mod sw {
    use super::StatusWord;

    /// Normal completion
    pub const SW_NO_ERROR: StatusWord = StatusWord::new(0x90, 0x00);
    /// File or record not found; sentinel for "no more entries" on listing
    pub const SW_FILE_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x82);
    /// Security status not satisfied
    pub const SW_SECURITY_STATUS_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x82);
    /// Authentication method blocked
    pub const SW_AUTHENTICATION_METHOD_BLOCKED: StatusWord = StatusWord::new(0x69, 0x83);
    /// Wrong length field
    pub const SW_WRONG_LENGTH: StatusWord = StatusWord::new(0x67, 0x00);
    /// Incorrect P1 or P2 parameter
    pub const SW_INCORRECT_P1P2: StatusWord = StatusWord::new(0x6A, 0x86);
}

/// A failure the card reported through its status word
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CardError {
    /// Referenced file does not exist
    #[error("file not found")]
    FileNotFound,
    /// An access condition was not fulfilled
    #[error("security status not satisfied")]
    SecurityStatusNotSatisfied,
    /// Too many failed verification attempts
    #[error("authentication method blocked")]
    AuthenticationMethodBlocked,
    /// P1/P2 or the data field do not fit the command
    #[error("incorrect command parameters")]
    IncorrectParameters,
    /// The command is not allowed in the current state
    #[error("command not allowed")]
    NotAllowed,
    /// The length field does not match the data
    #[error("wrong length")]
    WrongLength,
    /// Persistent memory failed
    #[error("card memory failure")]
    MemoryFailure,
    /// Any status word without a dedicated mapping
    #[error("card returned error status {0}")]
    Unknown(StatusWord),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_detection() {
        assert!(StatusWord::new(0x90, 0x00).is_success());
        assert!(StatusWord::new(0x61, 0x10).is_success());
        assert!(!StatusWord::new(0x90, 0x01).is_success());
        assert!(!StatusWord::new(0x6A, 0x82).is_success());
    }

    #[test]
    fn test_translation_table() {
        assert!(sw::SW_NO_ERROR.check().is_ok());
        assert_eq!(sw::SW_FILE_NOT_FOUND.check(), Err(CardError::FileNotFound));
        assert_eq!(
            sw::SW_SECURITY_STATUS_NOT_SATISFIED.check(),
            Err(CardError::SecurityStatusNotSatisfied)
        );
        assert_eq!(
            StatusWord::new(0x6B, 0x00).check(),
            Err(CardError::IncorrectParameters)
        );
        assert_eq!(
            StatusWord::new(0x12, 0x34).check(),
            Err(CardError::Unknown(StatusWord::new(0x12, 0x34)))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusWord::new(0x6A, 0x82).to_string(), "6A82");
        assert_eq!(StatusWord::new(0x6A, 0x82).to_u16(), 0x6A82);
    }
}
