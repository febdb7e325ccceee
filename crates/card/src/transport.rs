//! Transport boundary for exchanging command frames with a card.

use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;

/// Error type for transport-level failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The exchange itself failed below the card protocol
    #[error("transmit failed: {0}")]
    Transmit(&'static str),

    /// The exclusive-access lock could not be taken or returned
    #[error("card lock failed: {0}")]
    Lock(&'static str),

    /// The reader or card went away
    #[error("device unavailable: {0}")]
    Device(String),
}

/// A blocking command/response transport to a single card session.
///
/// Implementations exchange one command frame for one response frame; the
/// response carries the trailing two status bytes. [`lock`](Self::lock) and
/// [`unlock`](Self::unlock) bracket multi-command sequences that must not be
/// interleaved with other traffic on the same session. The lock is not
/// reentrant. Timeouts, retries and reader plumbing all live below this
/// trait.
pub trait CardTransport: fmt::Debug {
    /// Exchange one command frame for a response frame
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Take exclusive access for a multi-command sequence
    fn lock(&mut self) -> Result<(), TransportError>;

    /// Return exclusive access
    fn unlock(&mut self) -> Result<(), TransportError>;
}

/// Scripted transport for tests.
///
/// Responses are played back in the order they were queued; every transmitted
/// frame and the lock balance are recorded for assertions.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: VecDeque<Bytes>,
    /// Frames transmitted so far, in order
    pub transmitted: Vec<Bytes>,
    /// Net lock depth; zero when lock use is balanced
    pub lock_depth: i32,
    /// Number of times the lock was taken
    pub lock_count: usize,
}

impl MockTransport {
    /// Create an empty mock with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that plays back the given responses in order
    pub fn with_responses<I, B>(responses: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Queue one more response
    pub fn push_response<B: Into<Bytes>>(&mut self, response: B) {
        self.responses.push_back(response.into());
    }
}

impl CardTransport for MockTransport {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.transmitted.push(Bytes::copy_from_slice(command));
        self.responses
            .pop_front()
            .ok_or(TransportError::Transmit("response script exhausted"))
    }

    fn lock(&mut self) -> Result<(), TransportError> {
        self.lock_depth += 1;
        self.lock_count += 1;
        Ok(())
    }

    fn unlock(&mut self) -> Result<(), TransportError> {
        self.lock_depth -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_order() {
        let mut transport =
            MockTransport::with_responses([vec![0x90u8, 0x00], vec![0x6A, 0x82]]);
        assert_eq!(
            transport.transmit_raw(&[0x00]).unwrap().as_ref(),
            &[0x90, 0x00]
        );
        assert_eq!(
            transport.transmit_raw(&[0x01]).unwrap().as_ref(),
            &[0x6A, 0x82]
        );
        assert!(transport.transmit_raw(&[0x02]).is_err());
        assert_eq!(transport.transmitted.len(), 3);
    }

    #[test]
    fn test_lock_balance() {
        let mut transport = MockTransport::new();
        transport.lock().unwrap();
        transport.unlock().unwrap();
        assert_eq!(transport.lock_depth, 0);
        assert_eq!(transport.lock_count, 1);
    }
}
