//! Key usage derivation.
//!
//! Certificates carry an X.509 key-usage bit string; key descriptors carry
//! PKCS#15-style usage sets. [`map_usage`] derives the public/private pair
//! from the certificate bits.

use std::ops::{BitOr, BitOrAssign};

use crate::certificate::KeyAlgorithm;

/// X.509 key usage bits, least significant bit first (bit 0 is
/// digitalSignature).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CertUsage(u16);

impl CertUsage {
    /// digitalSignature
    pub const DIGITAL_SIGNATURE: Self = Self(0x0001);
    /// nonRepudiation
    pub const NON_REPUDIATION: Self = Self(0x0002);
    /// keyEncipherment
    pub const KEY_ENCIPHERMENT: Self = Self(0x0004);
    /// dataEncipherment
    pub const DATA_ENCIPHERMENT: Self = Self(0x0008);
    /// keyAgreement
    pub const KEY_AGREEMENT: Self = Self(0x0010);
    /// keyCertSign
    pub const KEY_CERT_SIGN: Self = Self(0x0020);
    /// cRLSign
    pub const CRL_SIGN: Self = Self(0x0040);

    /// Usage assumed when the certificate carries no key usage extension
    pub const DEFAULT: Self = Self(Self::KEY_ENCIPHERMENT.0 | Self::DIGITAL_SIGNATURE.0);

    /// From raw bits
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// PKCS#15-style key usage set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyUsage(u16);

impl KeyUsage {
    /// Encrypt
    pub const ENCRYPT: Self = Self(0x0001);
    /// Decrypt
    pub const DECRYPT: Self = Self(0x0002);
    /// Sign
    pub const SIGN: Self = Self(0x0004);
    /// Sign with message recovery
    pub const SIGN_RECOVER: Self = Self(0x0008);
    /// Wrap another key
    pub const WRAP: Self = Self(0x0010);
    /// Unwrap another key
    pub const UNWRAP: Self = Self(0x0020);
    /// Verify
    pub const VERIFY: Self = Self(0x0040);
    /// Verify with message recovery
    pub const VERIFY_RECOVER: Self = Self(0x0080);
    /// Derive a shared secret
    pub const DERIVE: Self = Self(0x0100);
    /// Non-repudiation
    pub const NON_REPUDIATION: Self = Self(0x0200);

    /// Whether every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no usage is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for KeyUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for KeyUsage {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Per-bit mapping from certificate usage onto private key usage
const PRIVATE_KEY_USAGE: [KeyUsage; 7] = [
    KeyUsage(KeyUsage::SIGN.0 | KeyUsage::SIGN_RECOVER.0), // digitalSignature
    KeyUsage::NON_REPUDIATION,                             // nonRepudiation
    KeyUsage::UNWRAP,                                      // keyEncipherment
    KeyUsage::DECRYPT,                                     // dataEncipherment
    KeyUsage::DERIVE,                                      // keyAgreement
    KeyUsage(KeyUsage::SIGN.0 | KeyUsage::SIGN_RECOVER.0), // keyCertSign
    KeyUsage(KeyUsage::SIGN.0 | KeyUsage::SIGN_RECOVER.0), // cRLSign
];

/// Per-bit mapping from certificate usage onto public key usage
const PUBLIC_KEY_USAGE: [KeyUsage; 7] = [
    KeyUsage(KeyUsage::VERIFY.0 | KeyUsage::VERIFY_RECOVER.0),
    KeyUsage::NON_REPUDIATION,
    KeyUsage::WRAP,
    KeyUsage::ENCRYPT,
    KeyUsage::DERIVE,
    KeyUsage(KeyUsage::VERIFY.0 | KeyUsage::VERIFY_RECOVER.0),
    KeyUsage(KeyUsage::VERIFY.0 | KeyUsage::VERIFY_RECOVER.0),
];

/// Map certificate usage bits and the key algorithm onto the
/// (public, private) key usage pair.
pub fn map_usage(usage: CertUsage, algorithm: KeyAlgorithm) -> (KeyUsage, KeyUsage) {
    // Key derivation only ever reaches this point for RSA; the parameter is
    // the seam for future algorithm-specific adjustments.
    let _ = algorithm;
    let mut public = KeyUsage::default();
    let mut private = KeyUsage::default();
    for bit in 0..PRIVATE_KEY_USAGE.len() {
        if usage.bits() & (1 << bit) != 0 {
            public |= PUBLIC_KEY_USAGE[bit];
            private |= PRIVATE_KEY_USAGE[bit];
        }
    }
    (public, private)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_usage_mapping() {
        let (public, private) = map_usage(CertUsage::DEFAULT, KeyAlgorithm::Rsa);
        assert!(public.contains(KeyUsage::VERIFY | KeyUsage::VERIFY_RECOVER | KeyUsage::WRAP));
        assert!(private.contains(KeyUsage::SIGN | KeyUsage::SIGN_RECOVER | KeyUsage::UNWRAP));
        assert!(!private.contains(KeyUsage::DECRYPT));
    }

    #[test]
    fn test_signature_only() {
        let (public, private) = map_usage(CertUsage::DIGITAL_SIGNATURE, KeyAlgorithm::Rsa);
        assert_eq!(public, KeyUsage::VERIFY | KeyUsage::VERIFY_RECOVER);
        assert_eq!(private, KeyUsage::SIGN | KeyUsage::SIGN_RECOVER);
    }

    #[test]
    fn test_no_usage_bits() {
        let (public, private) = map_usage(CertUsage::default(), KeyAlgorithm::Rsa);
        assert!(public.is_empty());
        assert!(private.is_empty());
    }
}
