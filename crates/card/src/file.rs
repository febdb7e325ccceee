//! File control metadata codecs.
//!
//! A successful select returns a fixed-layout descriptor block; creation
//! sends a closely related block back. Both directions live here so the
//! layouts cannot drift apart.

use crate::acl::{AccessCondition, AccessConditions, Operation};
use crate::error::{Error, Result};

/// Minimum length of a select reply carrying a descriptor
pub const MIN_REPLY_LEN: usize = 14;

/// Leading tag of an FCI template, which this codec rejects
const FCI_TAG: u8 = 0x6F;

/// File kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Dedicated file (directory)
    Df,
    /// Working elementary file
    WorkingEf,
}

/// Record organisation of an elementary file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EfStructure {
    /// Flat byte array
    Transparent,
    /// Fixed-length records
    LinearFixed,
    /// Variable-length records
    LinearVariable,
    /// Ring of fixed-length records
    Cyclic,
}

/// Activation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// File is usable
    Activated,
    /// File has been invalidated
    Invalidated,
}

/// Structured file control metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// File body size in bytes
    pub size: u16,
    /// File identifier
    pub id: u16,
    /// DF or working EF
    pub kind: FileKind,
    /// Record organisation; set only for working EFs
    pub structure: Option<EfStructure>,
    /// Per-operation access conditions
    pub acl: AccessConditions,
    /// Activation status
    pub status: FileStatus,
    /// Record length for record-structured EFs
    pub record_length: u8,
    /// Record count for record-structured EFs
    pub record_count: u8,
}

fn split_nibbles(byte: u8) -> (AccessCondition, AccessCondition) {
    (
        AccessCondition::from_nibble(byte >> 4),
        AccessCondition::from_nibble(byte),
    )
}

impl FileDescriptor {
    /// Decode a select reply into a descriptor.
    ///
    /// The reply layout after a 2-byte prefix: size and id (big-endian),
    /// type byte, one reserved byte, three ACL bytes packed as nibble pairs,
    /// status byte, then a length-prefixed trailer. The trailer's fourth byte
    /// carries the record length for linear-fixed and cyclic EFs.
    pub fn decode(reply: &[u8]) -> Result<Self> {
        if reply.len() < MIN_REPLY_LEN {
            return Err(Error::TooShort {
                expected: MIN_REPLY_LEN,
                actual: reply.len(),
            });
        }
        if reply[0] == FCI_TAG {
            return Err(Error::UnsupportedReplyFormat);
        }

        let size = u16::from_be_bytes([reply[2], reply[3]]);
        let id = u16::from_be_bytes([reply[4], reply[5]]);
        let (kind, structure) = match reply[6] {
            0x01 => (FileKind::WorkingEf, Some(EfStructure::Transparent)),
            0x02 => (FileKind::WorkingEf, Some(EfStructure::LinearFixed)),
            0x04 => (FileKind::WorkingEf, Some(EfStructure::LinearVariable)),
            0x06 => (FileKind::WorkingEf, Some(EfStructure::Cyclic)),
            0x38 => (FileKind::Df, None),
            other => return Err(Error::UnknownFileType(other)),
        };

        // reply[7] is reserved
        let mut acl = AccessConditions::default();
        match kind {
            FileKind::Df => {
                let (list, _) = split_nibbles(reply[8]);
                let (delete, create) = split_nibbles(reply[9]);
                acl.set(Operation::List, list);
                acl.set(Operation::Delete, delete);
                acl.set(Operation::Create, create);
            }
            FileKind::WorkingEf => {
                let (read, data_op) = split_nibbles(reply[8]);
                acl.set(Operation::Read, read);
                match structure {
                    Some(EfStructure::Cyclic) => acl.set(Operation::Decrease, data_op),
                    _ => acl.set(Operation::Update, data_op),
                }
                let (rehabilitate, invalidate) = split_nibbles(reply[10]);
                acl.set(Operation::Rehabilitate, rehabilitate);
                acl.set(Operation::Invalidate, invalidate);
            }
        }

        let status = if reply[11] != 0 {
            FileStatus::Activated
        } else {
            FileStatus::Invalidated
        };

        let trailer_len = reply[12] as usize;
        let trailer = reply[13..].get(..trailer_len).unwrap_or(&reply[13..]);
        let record_length = match structure {
            Some(EfStructure::LinearFixed | EfStructure::Cyclic) => {
                trailer.get(3).copied().unwrap_or(0)
            }
            _ => 0,
        };

        Ok(Self {
            size,
            id,
            kind,
            structure,
            acl,
            status,
            record_length,
            record_count: 0,
        })
    }

    /// Encode a descriptor into the creation layout.
    ///
    /// The first two bytes are placeholders for a size field not derivable
    /// at encode time; byte 7 is the permissive increase/decrease flag.
    /// Record-structured layouts append the record length as a trailing byte.
    /// An unrepresentable access condition fails with [`Error::InvalidAcl`]
    /// before any bytes are produced.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let type_byte = match (self.kind, self.structure) {
            (FileKind::Df, _) => 0x38,
            (FileKind::WorkingEf, Some(EfStructure::Transparent)) => 0x01,
            (FileKind::WorkingEf, Some(EfStructure::LinearFixed)) => 0x02,
            (FileKind::WorkingEf, Some(EfStructure::LinearVariable)) => 0x04,
            (FileKind::WorkingEf, Some(EfStructure::Cyclic)) => 0x06,
            (FileKind::WorkingEf, None) => {
                return Err(Error::InvalidArguments(
                    "elementary file requires a record structure",
                ));
            }
        };

        let mut out = vec![0u8; 16];
        out[0] = 0xFF;
        out[1] = 0xFF;
        out[2..4].copy_from_slice(&self.size.to_be_bytes());
        out[4..6].copy_from_slice(&self.id.to_be_bytes());
        out[6] = type_byte;
        out[7] = 0xFF; // allow decrease and increase

        match self.kind {
            FileKind::Df => {
                out[8] = self.acl.get(Operation::List).to_nibble()? << 4;
                out[9] = (self.acl.get(Operation::Delete).to_nibble()? << 4)
                    | self.acl.get(Operation::Create).to_nibble()?;
            }
            FileKind::WorkingEf => {
                let data_op = match self.structure {
                    Some(EfStructure::Cyclic) => Operation::Decrease,
                    _ => Operation::Update,
                };
                out[8] = (self.acl.get(Operation::Read).to_nibble()? << 4)
                    | self.acl.get(data_op).to_nibble()?;
                out[10] = (self.acl.get(Operation::Rehabilitate).to_nibble()? << 4)
                    | self.acl.get(Operation::Invalidate).to_nibble()?;
            }
        }

        out[11] = match self.status {
            FileStatus::Activated => 0x01,
            FileStatus::Invalidated => 0x00,
        };

        let extended = matches!(
            self.structure,
            Some(EfStructure::LinearFixed | EfStructure::Cyclic)
        );
        out[12] = if extended { 0x04 } else { 0x03 };
        // out[13..16] are reserved and stay zero
        if extended {
            out.push(self.record_length);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ef_descriptor(structure: EfStructure) -> FileDescriptor {
        let mut acl = AccessConditions::default();
        acl.set(Operation::Read, AccessCondition::None);
        match structure {
            EfStructure::Cyclic => acl.set(Operation::Decrease, AccessCondition::Pin1),
            _ => acl.set(Operation::Update, AccessCondition::Pin1),
        }
        acl.set(Operation::Rehabilitate, AccessCondition::ExternalAuth);
        acl.set(Operation::Invalidate, AccessCondition::Never);
        FileDescriptor {
            size: 0x0200,
            id: 0x4101,
            kind: FileKind::WorkingEf,
            structure: Some(structure),
            acl,
            status: FileStatus::Activated,
            record_length: 0x10,
            record_count: 0,
        }
    }

    #[test]
    fn test_transparent_ef_round_trip() {
        let descriptor = ef_descriptor(EfStructure::Transparent);
        let encoded = descriptor.encode().unwrap();
        assert_eq!(encoded.len(), 16);
        let decoded = FileDescriptor::decode(&encoded).unwrap();
        assert_eq!(decoded.size, descriptor.size);
        assert_eq!(decoded.id, descriptor.id);
        assert_eq!(decoded.kind, descriptor.kind);
        assert_eq!(decoded.structure, descriptor.structure);
        assert_eq!(decoded.status, descriptor.status);
        assert_eq!(decoded.acl, descriptor.acl);
        assert_eq!(decoded.record_length, 0);
    }

    #[test]
    fn test_cyclic_ef_round_trip_keeps_record_length() {
        let descriptor = ef_descriptor(EfStructure::Cyclic);
        let encoded = descriptor.encode().unwrap();
        assert_eq!(encoded.len(), 17);
        let decoded = FileDescriptor::decode(&encoded).unwrap();
        assert_eq!(decoded.structure, Some(EfStructure::Cyclic));
        assert_eq!(decoded.record_length, 0x10);
        assert_eq!(decoded.acl, descriptor.acl);
    }

    #[test]
    fn test_df_round_trip() {
        let mut acl = AccessConditions::default();
        acl.set(Operation::List, AccessCondition::None);
        acl.set(Operation::Delete, AccessCondition::Pin2);
        acl.set(Operation::Create, AccessCondition::Pin1);
        let descriptor = FileDescriptor {
            size: 0x1000,
            id: 0x3F00,
            kind: FileKind::Df,
            structure: None,
            acl,
            status: FileStatus::Activated,
            record_length: 0,
            record_count: 0,
        };
        let decoded = FileDescriptor::decode(&descriptor.encode().unwrap()).unwrap();
        assert_eq!(decoded.kind, FileKind::Df);
        assert_eq!(decoded.structure, None);
        assert_eq!(decoded.acl, descriptor.acl);
        assert_eq!(decoded.id, 0x3F00);
    }

    #[test]
    fn test_too_short_reply() {
        assert!(matches!(
            FileDescriptor::decode(&[0u8; 10]),
            Err(Error::TooShort {
                expected: 14,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_unknown_file_type() {
        let mut reply = [0u8; 16];
        reply[6] = 0x99;
        assert!(matches!(
            FileDescriptor::decode(&reply),
            Err(Error::UnknownFileType(0x99))
        ));
    }

    #[test]
    fn test_fci_reply_is_rejected() {
        let mut reply = [0u8; 16];
        reply[0] = 0x6F;
        assert!(matches!(
            FileDescriptor::decode(&reply),
            Err(Error::UnsupportedReplyFormat)
        ));
    }

    #[test]
    fn test_unknown_acl_does_not_encode() {
        let mut descriptor = ef_descriptor(EfStructure::Transparent);
        descriptor.acl.set(Operation::Read, AccessCondition::Unknown);
        assert!(matches!(descriptor.encode(), Err(Error::InvalidAcl(_))));
    }

    #[test]
    fn test_invalidated_status() {
        let mut descriptor = ef_descriptor(EfStructure::Transparent);
        descriptor.status = FileStatus::Invalidated;
        let decoded = FileDescriptor::decode(&descriptor.encode().unwrap()).unwrap();
        assert_eq!(decoded.status, FileStatus::Invalidated);
    }
}
