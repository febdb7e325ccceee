//! Hierarchical file paths.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Identifier of the root directory (master file)
pub const MF_ID: [u8; 2] = [0x3F, 0x00];

/// How a path addresses a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    /// Sequence of 2-byte file identifiers starting from the root
    FullPath,
    /// Application DF name
    DfName,
    /// Single file identifier, relative to the current DF
    FileId,
}

/// A card file path
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Path {
    kind: PathKind,
    value: Vec<u8>,
}

impl Path {
    /// A full path from raw bytes
    pub fn full(value: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: PathKind::FullPath,
            value: value.into(),
        }
    }

    /// A full path from 2-byte file identifier components
    pub fn from_components(components: &[u16]) -> Self {
        Self::full(
            components
                .iter()
                .flat_map(|id| id.to_be_bytes())
                .collect::<Vec<u8>>(),
        )
    }

    /// The root (master file) path
    pub fn mf() -> Self {
        Self::full(MF_ID.to_vec())
    }

    /// A single file identifier
    pub fn file_id(id: u16) -> Self {
        Self {
            kind: PathKind::FileId,
            value: id.to_be_bytes().to_vec(),
        }
    }

    /// An application DF name
    pub fn df_name(name: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: PathKind::DfName,
            value: name.into(),
        }
    }

    /// How this path addresses its file
    pub const fn kind(&self) -> PathKind {
        self.kind
    }

    /// Raw path bytes
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Length of the raw path in bytes
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Whether the path has no bytes at all
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Whether the path is exactly the root identifier
    pub fn is_root(&self) -> bool {
        self.value == MF_ID
    }

    /// Whether the path's first component is the root identifier
    pub fn starts_at_root(&self) -> bool {
        self.value.starts_with(&MF_ID)
    }

    /// The 2-byte components of the path, left to right
    pub fn components(&self) -> impl Iterator<Item = [u8; 2]> + '_ {
        self.value.chunks_exact(2).map(|chunk| [chunk[0], chunk[1]])
    }

    /// The same path prefixed with the root identifier.
    ///
    /// Card-relative addressing is normalized this way before the path
    /// selector sees it.
    pub fn rebase_under_root(&self) -> Self {
        let mut value = MF_ID.to_vec();
        value.extend_from_slice(&self.value);
        Self::full(value)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.value))
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({:?}, {})", self.kind, self)
    }
}

impl FromStr for Path {
    type Err = Error;

    /// Parse a full path from a hex string such as `"3F004100"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex::decode(s)
            .map(Self::full)
            .map_err(|_| Error::InvalidArguments("path is not an even-length hex string"))
    }
}
