//! Vendor control boundary.
//!
//! Identity cards expose their object directory through card-specific
//! control operations rather than the file system. Each enumeration is a
//! two-phase protocol: an init call returns the object count, every iterate
//! call yields one record, and a final call releases iteration state on the
//! card side. The final call must run even when iteration fails.

use tessera_card::Path;

use crate::store::ObjectId;

/// Card family established during matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    /// First-generation identity card
    Identity,
    /// Second-generation identity card
    IdentityV2,
    /// Anything else; emulation refuses to bind
    Other,
}

impl CardKind {
    /// Default token label for the family
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Identity => "Identity Card",
            Self::IdentityV2 => "Identity Card v2",
            Self::Other => "Unknown Card",
        }
    }

    /// Whether identity emulation supports this family
    pub const fn is_identity(self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// One enumerated card object
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    /// Object identifier; for certificate slots it also keys the derived
    /// key pair
    pub id: ObjectId,
    /// Application label
    pub label: String,
    /// On-card path of the object body
    pub path: Path,
}

/// Vendor-specific control operations of an identity card.
///
/// Implemented by the concrete card backend; the credential builder only
/// ever talks to this trait.
pub trait CardControl {
    /// Card family, checked before emulation binds
    fn card_kind(&self) -> CardKind;

    /// Card serial number bytes
    fn serial_number(&mut self) -> tessera_card::Result<Vec<u8>>;

    /// Path that must be selected before PIN verification
    fn authentication_path(&mut self) -> tessera_card::Result<Path>;

    /// Start generic object enumeration, returning the object count
    fn begin_data_objects(&mut self) -> tessera_card::Result<usize>;

    /// Yield the next generic object
    fn next_data_object(&mut self) -> tessera_card::Result<ObjectRecord>;

    /// Release generic object iteration state
    fn finish_data_objects(&mut self) -> tessera_card::Result<()>;

    /// Start certificate slot enumeration, returning the slot count
    fn begin_certificate_objects(&mut self) -> tessera_card::Result<usize>;

    /// Yield the next certificate slot
    fn next_certificate_object(&mut self) -> tessera_card::Result<ObjectRecord>;

    /// Release certificate iteration state
    fn finish_certificate_objects(&mut self) -> tessera_card::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_gate() {
        assert!(CardKind::Identity.is_identity());
        assert!(CardKind::IdentityV2.is_identity());
        assert!(!CardKind::Other.is_identity());
    }
}
