//! Error types for card file system operations.

use crate::acl::AccessCondition;
use crate::status::CardError;
use crate::transport::TransportError;

/// Result type for card operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for card operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A path or descriptor was malformed, detected before any I/O
    #[error("invalid arguments: {0}")]
    InvalidArguments(&'static str),

    /// The transport layer failed to complete an exchange
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The card reported a failure status word
    #[error(transparent)]
    Card(#[from] CardError),

    /// The response did not have the shape the operation expects
    #[error("unknown reply format")]
    UnknownReply,

    /// A select reply was shorter than the fixed descriptor layout
    #[error("reply too short: {actual} bytes, need at least {expected}")]
    TooShort {
        /// Minimum length the codec requires
        expected: usize,
        /// Length actually received
        actual: usize,
    },

    /// The card answered with an FCI template, which this driver does not parse
    #[error("unsupported reply format")]
    UnsupportedReplyFormat,

    /// The type byte of a select reply matches no known file type
    #[error("unknown file type {0:#04x}")]
    UnknownFileType(u8),

    /// A paged response had the wrong size
    #[error("illegal response: expected {expected} bytes, got {actual}")]
    IllegalResponse {
        /// Size every page must have
        expected: usize,
        /// Size actually received
        actual: usize,
    },

    /// The access condition has no on-card encoding
    #[error("access condition {0:?} has no on-card encoding")]
    InvalidAcl(AccessCondition),
}
