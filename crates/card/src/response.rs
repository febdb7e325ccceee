//! Response frames.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::status::StatusWord;

/// A response frame: payload plus the trailing status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    payload: Bytes,
    status: StatusWord,
}

impl Response {
    /// Split raw response bytes into payload and status word.
    ///
    /// Fails with [`Error::UnknownReply`] when the frame is too short to even
    /// carry a status word.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::UnknownReply);
        }
        let (payload, status) = bytes.split_at(bytes.len() - 2);
        Ok(Self {
            payload: Bytes::copy_from_slice(payload),
            status: StatusWord::new(status[0], status[1]),
        })
    }

    /// Response payload without the status word
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The trailing status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Whether the card reported normal completion
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Translate the status word and hand out the payload on success
    pub fn into_payload(self) -> Result<Bytes> {
        self.status.check()?;
        Ok(self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::sw;

    #[test]
    fn test_split() {
        let response = Response::from_bytes(&[0x01, 0x02, 0x90, 0x00]).unwrap();
        assert_eq!(response.payload(), &[0x01, 0x02]);
        assert_eq!(response.status(), sw::SW_NO_ERROR);
        assert!(response.is_success());
    }

    #[test]
    fn test_status_only() {
        let response = Response::from_bytes(&[0x6A, 0x82]).unwrap();
        assert!(response.payload().is_empty());
        assert_eq!(response.status(), sw::SW_FILE_NOT_FOUND);
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            Response::from_bytes(&[0x90]),
            Err(Error::UnknownReply)
        ));
    }

    #[test]
    fn test_into_payload_gates_on_status() {
        let response = Response::from_bytes(&[0xAA, 0x69, 0x82]).unwrap();
        assert!(response.into_payload().is_err());
    }
}
