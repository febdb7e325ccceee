//! Error types for identity emulation.

use crate::certificate::CertificateError;
use crate::store::StoreError;

/// Result type for identity emulation
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for identity emulation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Card driver or transport failure
    #[error(transparent)]
    Card(#[from] tessera_card::Error),

    /// The bound card is not an identity card
    #[error("wrong card for identity emulation")]
    WrongCard,

    /// The certificate carries a key algorithm key derivation does not support
    #[error("unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Certificate parsing failed
    #[error(transparent)]
    Certificate(#[from] CertificateError),

    /// The identity store rejected an object
    #[error(transparent)]
    Store(#[from] StoreError),
}
