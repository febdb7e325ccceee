//! Identity card credential emulation
//!
//! This crate builds the credential view of an identity card on top of the
//! [`tessera-card`](tessera_card) driver: it enumerates the card's PIN,
//! data and certificate objects through vendor control operations, reads and
//! caches certificate bodies, derives RSA public/private key descriptors and
//! key usage from each certificate, and hands the resulting objects to an
//! identity store for consumption by higher-level PKI tooling.
//!
//! ## Overview
//!
//! - [`control`] is the boundary to the vendor-specific card control
//!   operations (serial number, authentication path, object enumeration)
//! - [`certificate`] is the parser boundary, with an X.509 implementation
//!   on the RustCrypto stack
//! - [`store`] holds the emitted object model and the output boundary
//! - [`usage`] maps certificate key-usage bits onto key descriptor usage
//! - [`builder`] runs the emulation build pass over all of the above
//!
//! Emulated objects live only for the current process; nothing is persisted.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod builder;
pub mod certificate;
pub mod control;
pub mod error;
mod pins;
pub mod store;
pub mod usage;

pub use builder::{FileReader, build};
pub use certificate::{CertificateParser, ParsedCertificate, X509Parser};
pub use control::{CardControl, CardKind, ObjectRecord};
pub use error::{Error, Result};
pub use store::{IdentityStore, MemoryStore, ObjectId, TokenInfo};
pub use usage::{CertUsage, KeyUsage};
