//! Static PIN table.
//!
//! PIN descriptors are not enumerated from the card; the family exposes one
//! global PIN whose attributes are fixed. Only the access path comes from
//! the card, through the control boundary.

use tessera_card::Path;

use crate::store::{ObjectFlags, ObjectId, PinFlags, PinKind, PinObject};

pub(crate) struct PinTemplate {
    pub id: u8,
    pub label: &'static str,
    pub reference: u8,
    pub kind: PinKind,
    pub min_length: usize,
    pub max_length: usize,
    pub stored_length: usize,
    pub pad_char: u8,
    pub flags: PinFlags,
    pub tries_left: i32,
    pub object_flags: ObjectFlags,
}

pub(crate) const PIN_TEMPLATES: &[PinTemplate] = &[PinTemplate {
    id: 0x01,
    label: "PIN",
    reference: 0x00,
    kind: PinKind::AsciiNumeric,
    min_length: 4,
    max_length: 8,
    stored_length: 8,
    pad_char: 0xFF,
    flags: PinFlags::NEEDS_PADDING.union(PinFlags::INITIALIZED),
    tries_left: -1, // not read from the card
    object_flags: ObjectFlags::PRIVATE,
}];

impl PinTemplate {
    /// Build the authentication object, with the card-provided access path
    pub(crate) fn instantiate(&self, path: Path) -> PinObject {
        PinObject {
            id: ObjectId::new(vec![self.id]),
            label: self.label.to_owned(),
            reference: self.reference,
            kind: self.kind,
            min_length: self.min_length,
            max_length: self.max_length,
            stored_length: self.stored_length,
            pad_char: self.pad_char,
            flags: self.flags,
            tries_left: self.tries_left,
            object_flags: self.object_flags,
            path,
        }
    }
}

/// Authentication id private keys reference: the primary PIN
pub(crate) fn primary_auth_id() -> ObjectId {
    ObjectId::new(vec![PIN_TEMPLATES[0].id])
}
