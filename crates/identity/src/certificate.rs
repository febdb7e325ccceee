//! Certificate parser boundary and its X.509 implementation.
//!
//! The credential builder never parses DER itself; it talks to
//! [`CertificateParser`] and works on the [`ParsedCertificate`] view.
//! [`X509Parser`] is the production implementation on the RustCrypto stack.

use der::Decode;
use der::asn1::{BitStringRef, Ia5StringRef, PrintableStringRef, Utf8StringRef};
use der::oid::ObjectIdentifier;
use rsa::RsaPublicKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use x509_cert::Certificate;

/// Subject common name attribute
pub const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// Key usage certificate extension
pub const OID_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.15");

/// rsaEncryption public key algorithm
pub const OID_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// Error type for certificate parsing
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    /// The DER structure did not parse
    #[error("malformed certificate: {0}")]
    Der(#[from] der::Error),

    /// The certificate carries no usable subject public key
    #[error("missing or malformed subject public key")]
    MissingKey,
}

/// One attribute of a distinguished name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnAttribute {
    /// Attribute type
    pub oid: ObjectIdentifier,
    /// String rendition of the attribute value
    pub value: String,
}

/// A distinguished name as an ordered attribute list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName(pub Vec<DnAttribute>);

impl DistinguishedName {
    /// First value of the given attribute type
    pub fn attribute(&self, oid: &ObjectIdentifier) -> Option<&str> {
        self.0
            .iter()
            .find(|attribute| attribute.oid == *oid)
            .map(|attribute| attribute.value.as_str())
    }

    /// Subject common name
    pub fn common_name(&self) -> Option<&str> {
        self.attribute(&OID_COMMON_NAME)
    }
}

/// Key algorithm classes the emulation distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// RSA, the only algorithm key derivation supports
    Rsa,
    /// Everything else
    Other,
}

/// Public key material extracted from a certificate
#[derive(Debug, Clone)]
pub enum PublicKeyInfo {
    /// RSA public key
    Rsa(RsaPublicKey),
    /// An algorithm key derivation does not support, kept for diagnostics
    Unsupported(ObjectIdentifier),
}

impl PublicKeyInfo {
    /// Algorithm class of the key
    pub const fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Rsa(_) => KeyAlgorithm::Rsa,
            Self::Unsupported(_) => KeyAlgorithm::Other,
        }
    }
}

/// The parsed-certificate view the credential builder works on
#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    /// Subject distinguished name
    pub subject: DistinguishedName,
    /// Embedded public key
    pub key: PublicKeyInfo,
    /// Raw extension values keyed by extension id
    pub extensions: Vec<(ObjectIdentifier, Vec<u8>)>,
}

impl ParsedCertificate {
    /// Read a named extension as a bit string, least significant bit first.
    ///
    /// Returns `None` when the extension is absent or its value is not a
    /// DER bit string.
    pub fn bit_string_extension(&self, oid: &ObjectIdentifier) -> Option<u16> {
        let (_, value) = self.extensions.iter().find(|(id, _)| id == oid)?;
        let bits = BitStringRef::from_der(value).ok()?;
        let raw = bits.raw_bytes();
        let mut out = 0u16;
        for bit in 0..bits.bit_len().min(16) {
            if raw[bit / 8] & (0x80 >> (bit % 8)) != 0 {
                out |= 1 << bit;
            }
        }
        Some(out)
    }
}

/// Parser boundary: DER bytes in, [`ParsedCertificate`] out
pub trait CertificateParser {
    /// Parse one DER-encoded certificate
    fn parse(&self, der: &[u8]) -> Result<ParsedCertificate, CertificateError>;
}

/// X.509 parser on the RustCrypto stack
#[derive(Debug, Clone, Copy, Default)]
pub struct X509Parser;

impl CertificateParser for X509Parser {
    fn parse(&self, der: &[u8]) -> Result<ParsedCertificate, CertificateError> {
        let certificate = Certificate::from_der(der)?;
        let tbs = certificate.tbs_certificate;

        let mut subject = DistinguishedName::default();
        for rdn in tbs.subject.0.iter() {
            for attribute in rdn.0.iter() {
                if let Some(value) = string_value(&attribute.value) {
                    subject.0.push(DnAttribute {
                        oid: attribute.oid,
                        value,
                    });
                }
            }
        }

        let spki = tbs.subject_public_key_info;
        let key = if spki.algorithm.oid == OID_RSA_ENCRYPTION {
            let bits = spki
                .subject_public_key
                .as_bytes()
                .ok_or(CertificateError::MissingKey)?;
            RsaPublicKey::from_pkcs1_der(bits)
                .map(PublicKeyInfo::Rsa)
                .map_err(|_| CertificateError::MissingKey)?
        } else {
            PublicKeyInfo::Unsupported(spki.algorithm.oid)
        };

        let extensions = tbs
            .extensions
            .map(|extensions| {
                extensions
                    .into_iter()
                    .map(|extension| (extension.extn_id, extension.extn_value.as_bytes().to_vec()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ParsedCertificate {
            subject,
            key,
            extensions,
        })
    }
}

/// Render a directory string attribute value, whatever its ASN.1 flavour
fn string_value(value: &der::Any) -> Option<String> {
    if let Ok(s) = value.decode_as::<Utf8StringRef<'_>>() {
        return Some(s.to_string());
    }
    if let Ok(s) = value.decode_as::<PrintableStringRef<'_>>() {
        return Some(s.to_string());
    }
    if let Ok(s) = value.decode_as::<Ia5StringRef<'_>>() {
        return Some(s.to_string());
    }
    None
}
