//! Identity object model and the output store boundary.
//!
//! The build pass emits these objects into an [`IdentityStore`]; PKCS#11 and
//! friends consume them from there. [`MemoryStore`] is the plain in-memory
//! implementation.

use std::fmt;

use bytes::Bytes;
use rsa::RsaPublicKey;
use tessera_card::Path;

use crate::usage::KeyUsage;

/// Error type for store insertions
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store rejected the object
    #[error("store rejected {0}")]
    Rejected(&'static str),
}

/// Short object identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(Vec<u8>);

impl ObjectId {
    /// Create an identifier from raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw identifier bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key reference derived from the first two identifier bytes
    pub fn key_reference(&self) -> u16 {
        let hi = self.0.first().copied().unwrap_or(0);
        let lo = self.0.get(1).copied().unwrap_or(0);
        u16::from_be_bytes([hi, lo])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// Token-level information for the emulated card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// Token label; the first certificate's subject common name replaces the
    /// card-family default
    pub label: String,
    /// Manufacturer
    pub manufacturer: String,
    /// Serial number as a hex string
    pub serial_number: String,
}

/// PIN kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinKind {
    /// ASCII digits
    AsciiNumeric,
}

/// PIN attribute flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinFlags(u16);

impl PinFlags {
    /// The PIN has been set on the card
    pub const INITIALIZED: Self = Self(0x0010);
    /// Verification data must be padded to the stored length
    pub const NEEDS_PADDING: Self = Self(0x0020);

    /// Combine two flag sets
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Object-level flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectFlags(u8);

impl ObjectFlags {
    /// Object is private to the card holder
    pub const PRIVATE: Self = Self(0x01);
    /// Object may be modified
    pub const MODIFIABLE: Self = Self(0x02);

    /// Combine two flag sets
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Authentication object backed by a card PIN
#[derive(Debug, Clone)]
pub struct PinObject {
    /// Authentication object identifier
    pub id: ObjectId,
    /// Display label
    pub label: String,
    /// On-card PIN reference
    pub reference: u8,
    /// PIN kind
    pub kind: PinKind,
    /// Minimum accepted length
    pub min_length: usize,
    /// Maximum accepted length
    pub max_length: usize,
    /// Length as stored on the card
    pub stored_length: usize,
    /// Padding byte
    pub pad_char: u8,
    /// PIN attribute flags
    pub flags: PinFlags,
    /// Remaining verification attempts; -1 when unknown
    pub tries_left: i32,
    /// Object-level flags
    pub object_flags: ObjectFlags,
    /// Path to select before verification
    pub path: Path,
}

/// Opaque data object
#[derive(Debug, Clone)]
pub struct DataObject {
    /// Object identifier
    pub id: ObjectId,
    /// Application label
    pub label: String,
    /// On-card path of the object body
    pub path: Path,
}

/// X.509 certificate object with its cached body
#[derive(Debug, Clone)]
pub struct CertificateObject {
    /// Object identifier, shared with the derived key pair
    pub id: ObjectId,
    /// Application label
    pub label: String,
    /// DER bytes, cached once read
    pub value: Bytes,
    /// On-card path; `None` once the body is cached, so consumers use the
    /// cached bytes instead of a card round-trip
    pub path: Option<Path>,
}

/// RSA public key descriptor
#[derive(Debug, Clone)]
pub struct PublicKeyDescriptor {
    /// Object identifier, shared with the certificate
    pub id: ObjectId,
    /// Application label
    pub label: String,
    /// Card key reference
    pub key_reference: u16,
    /// Allowed public key operations
    pub usage: KeyUsage,
    /// Modulus length in bits
    pub modulus_bits: usize,
    /// Key material, transferred out of the parsed certificate
    pub key: RsaPublicKey,
    /// Key lives on the card
    pub native: bool,
}

/// RSA private key descriptor
#[derive(Debug, Clone)]
pub struct PrivateKeyDescriptor {
    /// Object identifier, shared with the certificate
    pub id: ObjectId,
    /// Application label
    pub label: String,
    /// Card key reference
    pub key_reference: u16,
    /// Allowed private key operations
    pub usage: KeyUsage,
    /// Modulus length in bits
    pub modulus_bits: usize,
    /// Normalized on-card path of the key
    pub path: Path,
    /// Authentication object guarding key use
    pub auth_id: ObjectId,
    /// Object-level flags
    pub object_flags: ObjectFlags,
    /// Key lives on the card
    pub native: bool,
}

/// Output boundary: the container emulated identity objects are added to.
///
/// Insertion failures propagate as fatal build errors; [`clear`](Self::clear)
/// must leave the store as if no build pass had run.
pub trait IdentityStore {
    /// Add an authentication object
    fn add_pin(&mut self, pin: PinObject) -> Result<(), StoreError>;

    /// Add an opaque data object
    fn add_data_object(&mut self, object: DataObject) -> Result<(), StoreError>;

    /// Add a certificate object
    fn add_certificate(&mut self, certificate: CertificateObject) -> Result<(), StoreError>;

    /// Add an RSA public key descriptor
    fn add_rsa_public_key(&mut self, key: PublicKeyDescriptor) -> Result<(), StoreError>;

    /// Add an RSA private key descriptor
    fn add_rsa_private_key(&mut self, key: PrivateKeyDescriptor) -> Result<(), StoreError>;

    /// Drop everything added so far
    fn clear(&mut self);
}

/// In-memory identity store
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Authentication objects, in insertion order
    pub pins: Vec<PinObject>,
    /// Opaque data objects
    pub data_objects: Vec<DataObject>,
    /// Certificate objects
    pub certificates: Vec<CertificateObject>,
    /// Public key descriptors
    pub public_keys: Vec<PublicKeyDescriptor>,
    /// Private key descriptors
    pub private_keys: Vec<PrivateKeyDescriptor>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryStore {
    fn add_pin(&mut self, pin: PinObject) -> Result<(), StoreError> {
        self.pins.push(pin);
        Ok(())
    }

    fn add_data_object(&mut self, object: DataObject) -> Result<(), StoreError> {
        self.data_objects.push(object);
        Ok(())
    }

    fn add_certificate(&mut self, certificate: CertificateObject) -> Result<(), StoreError> {
        self.certificates.push(certificate);
        Ok(())
    }

    fn add_rsa_public_key(&mut self, key: PublicKeyDescriptor) -> Result<(), StoreError> {
        self.public_keys.push(key);
        Ok(())
    }

    fn add_rsa_private_key(&mut self, key: PrivateKeyDescriptor) -> Result<(), StoreError> {
        self.private_keys.push(key);
        Ok(())
    }

    fn clear(&mut self) {
        self.pins.clear();
        self.data_objects.clear();
        self.certificates.clear();
        self.public_keys.clear();
        self.private_keys.clear();
    }
}
