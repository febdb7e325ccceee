//! Card driver facade.
//!
//! [`Card`] composes the ATR matcher, the path selector and the file control
//! codecs over a [`CardTransport`] into the operation set a card framework
//! expects: match, select, list, create, delete, read.

use tracing::{debug, trace, warn};

use crate::atr;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::file::{EfStructure, FileDescriptor, FileKind, MIN_REPLY_LEN};
use crate::path::{MF_ID, Path, PathKind};
use crate::response::Response;
use crate::status::sw;
use crate::transport::CardTransport;

const INS_SELECT: u8 = 0xA4;
const INS_READ_BINARY: u8 = 0xB0;
const INS_LIST_FILES: u8 = 0xA8;
const INS_CREATE_FILE: u8 = 0xE0;
const INS_DELETE_FILE: u8 = 0xE4;

/// Class byte for the driver-specific directory and file management commands
const CLA_PROPRIETARY: u8 = 0xF0;

/// Size of one directory listing page: two framing bytes, then the file id
const LIST_PAGE_LEN: usize = 4;

/// Largest chunk a single read command may request
const READ_CHUNK: usize = 0xFF;

/// Select mode for DF names, passed in P1
const SELECT_BY_DF_NAME: u8 = 0x04;

/// ATR patterns of the cards this driver accepts; the table index doubles as
/// the card revision
const ATR_PATTERNS: &[&str] = &[
    "3B:95:94:40:FF:63:01:01:02:01",
    "3B:19:14:55:90:01:02:02:00:05:04:B0",
];

/// Immutable driver profile, composed once at startup.
///
/// There is deliberately no mutable global registry; a profile value is
/// built by [`profile`] and handed to every [`Card`] that needs it.
#[derive(Debug, Clone, Copy)]
pub struct DriverProfile {
    /// Human-readable driver name
    pub name: &'static str,
    /// Known ATR patterns, first match wins
    pub atr_table: &'static [&'static str],
    /// Class byte for the card's file system commands
    pub cla: u8,
}

impl DriverProfile {
    /// Probe an ATR against the pattern table.
    ///
    /// Pure and side-effect-free; probing never sends a command.
    pub fn match_atr(&self, atr: &[u8]) -> Option<usize> {
        atr::match_atr(atr, self.atr_table)
    }
}

/// The default driver profile
pub const fn profile() -> DriverProfile {
    DriverProfile {
        name: "tessera file system card",
        atr_table: ATR_PATTERNS,
        cla: 0xC0,
    }
}

/// Card driver facade over a transport
#[derive(Debug)]
pub struct Card<T: CardTransport> {
    transport: T,
    profile: DriverProfile,
}

/// Scoped traversal lock; released when dropped, on every exit path.
struct Locked<'a, T: CardTransport> {
    card: &'a mut Card<T>,
}

impl<'a, T: CardTransport> Locked<'a, T> {
    fn acquire(card: &'a mut Card<T>) -> Result<Self> {
        card.transport.lock()?;
        Ok(Self { card })
    }
}

impl<T: CardTransport> Drop for Locked<'_, T> {
    fn drop(&mut self) {
        if let Err(error) = self.card.transport.unlock() {
            warn!(%error, "failed to release traversal lock");
        }
    }
}

impl<T: CardTransport> Card<T> {
    /// Attach the default driver profile to a transport
    pub fn new(transport: T) -> Self {
        Self::with_profile(transport, profile())
    }

    /// Attach a specific driver profile to a transport
    pub const fn with_profile(transport: T, profile: DriverProfile) -> Self {
        Self { transport, profile }
    }

    /// Whether this driver accepts a card with the given ATR
    pub fn matches(&self, atr: &[u8]) -> bool {
        self.profile.match_atr(atr).is_some()
    }

    /// The driver profile in use
    pub const fn profile(&self) -> &DriverProfile {
        &self.profile
    }

    /// Get a reference to the transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn transmit(&mut self, command: &Command) -> Result<Response> {
        trace!(ins = command.ins(), "transmitting");
        let raw = self.transport.transmit_raw(&command.to_bytes())?;
        Response::from_bytes(&raw)
    }

    /// Select a file, optionally decoding its control metadata.
    ///
    /// Single-level selects issue one command. Full paths that are not the
    /// bare root run a traversal: the lock is taken for the whole sequence,
    /// the root is selected first when the path does not already start
    /// there, then every 2-byte component left to right. The lock is
    /// released on every exit path, including failing traversals.
    pub fn select(&mut self, path: &Path, want_metadata: bool) -> Result<Option<FileDescriptor>> {
        debug!(%path, kind = ?path.kind(), "selecting");
        match path.kind() {
            PathKind::FileId => {
                if path.len() % 2 != 0 {
                    return Err(Error::InvalidArguments("file id has odd length"));
                }
                self.select_single(path.value(), 0x00, want_metadata)
            }
            PathKind::DfName => self.select_single(path.value(), SELECT_BY_DF_NAME, want_metadata),
            PathKind::FullPath => {
                if path.is_empty() {
                    return Err(Error::InvalidArguments("empty path"));
                }
                if path.len() % 2 != 0 {
                    return Err(Error::InvalidArguments("path has odd length"));
                }
                if path.is_root() {
                    return self.select_single(path.value(), 0x00, want_metadata);
                }

                let mut locked = Locked::acquire(self)?;
                if !path.starts_at_root() {
                    locked.card.select_single(&MF_ID, 0x00, false)?;
                }
                let components: Vec<[u8; 2]> = path.components().collect();
                let (last, intermediate) = components
                    .split_last()
                    .ok_or(Error::InvalidArguments("empty path"))?;
                for component in intermediate {
                    locked.card.select_single(component, 0x00, false)?;
                }
                locked.card.select_single(last, 0x00, want_metadata)
            }
        }
    }

    /// One select command; the traversal above is built out of these.
    fn select_single(
        &mut self,
        file: &[u8],
        p1: u8,
        want_metadata: bool,
    ) -> Result<Option<FileDescriptor>> {
        let mut command = Command::new(self.profile.cla, INS_SELECT, p1, 0x00)
            .with_data(file.to_vec());
        if want_metadata {
            command = command.with_le(0x00);
        }
        let response = self.transmit(&command)?;
        // Status translation gates the decode: a delivered response that
        // carries a failure status never reaches the codec.
        response.status().check()?;
        if !want_metadata {
            return Ok(None);
        }
        if response.payload().len() < MIN_REPLY_LEN {
            return Err(Error::UnknownReply);
        }
        FileDescriptor::decode(response.payload()).map(Some)
    }

    /// List the file identifiers of the selected DF into `buf`, two bytes
    /// per entry. Returns the number of bytes written.
    ///
    /// The card pages entries one per command; status `6A82` is the "no more
    /// entries" sentinel, not an error. Every page must be exactly
    /// [`LIST_PAGE_LEN`] bytes.
    pub fn list_files(&mut self, buf: &mut [u8]) -> Result<usize> {
        let command = Command::new(CLA_PROPRIETARY, INS_LIST_FILES, 0x00, 0x00)
            .with_le(LIST_PAGE_LEN as u8);
        let mut count = 0;
        while buf.len() - count >= 2 {
            let response = self.transmit(&command)?;
            if response.status() == sw::SW_FILE_NOT_FOUND {
                break;
            }
            response.status().check()?;
            let payload = response.payload();
            if payload.len() != LIST_PAGE_LEN {
                return Err(Error::IllegalResponse {
                    expected: LIST_PAGE_LEN,
                    actual: payload.len(),
                });
            }
            buf[count..count + 2].copy_from_slice(&payload[2..4]);
            count += 2;
        }
        debug!(count, "listed directory");
        Ok(count)
    }

    /// Create a file under the selected DF.
    ///
    /// Encoding runs first, so an unrepresentable access condition aborts
    /// before any bytes go to the card.
    pub fn create_file(&mut self, file: &FileDescriptor) -> Result<()> {
        let encoded = file.encode()?;
        let record_count = match (file.kind, file.structure) {
            (FileKind::WorkingEf, Some(structure)) if structure != EfStructure::Transparent => {
                file.record_count
            }
            _ => 0,
        };
        debug!(id = file.id, "creating file");
        let command = Command::new(CLA_PROPRIETARY, INS_CREATE_FILE, 0x00, record_count)
            .with_data(encoded);
        let response = self.transmit(&command)?;
        response.status().check()?;
        Ok(())
    }

    /// Delete a child of the selected DF, addressed by a bare 2-byte file id.
    pub fn delete_file(&mut self, path: &Path) -> Result<()> {
        if path.kind() != PathKind::FileId || path.len() != 2 {
            return Err(Error::InvalidArguments(
                "delete takes a bare 2-byte file id",
            ));
        }
        debug!(%path, "deleting file");
        let command = Command::new(CLA_PROPRIETARY, INS_DELETE_FILE, 0x00, 0x00)
            .with_data(path.value().to_vec());
        let response = self.transmit(&command)?;
        response.status().check()?;
        Ok(())
    }

    /// Select `path` and read the whole file body.
    ///
    /// The body size comes from the selection metadata; reads are chunked to
    /// what a single command can carry.
    pub fn read_file(&mut self, path: &Path) -> Result<Vec<u8>> {
        let descriptor = self.select(path, true)?.ok_or(Error::UnknownReply)?;
        let mut out = Vec::with_capacity(descriptor.size as usize);
        let mut remaining = descriptor.size as usize;
        while remaining > 0 {
            let offset = out.len();
            let chunk = remaining.min(READ_CHUNK);
            let command = Command::new(
                self.profile.cla,
                INS_READ_BINARY,
                (offset >> 8) as u8,
                (offset & 0xFF) as u8,
            )
            .with_le(chunk as u8);
            let response = self.transmit(&command)?;
            response.status().check()?;
            let payload = response.payload();
            if payload.is_empty() {
                return Err(Error::IllegalResponse {
                    expected: chunk,
                    actual: 0,
                });
            }
            out.extend_from_slice(payload);
            remaining = remaining.saturating_sub(payload.len());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{AccessCondition, Operation};
    use crate::file::FileStatus;
    use crate::status::CardError;
    use crate::transport::MockTransport;

    const OK: [u8; 2] = [0x90, 0x00];

    /// Select reply for a 0x20-byte transparent EF 4100, everything free
    fn select_reply() -> Vec<u8> {
        let mut reply = vec![0u8; 16];
        reply[2] = 0x00;
        reply[3] = 0x20; // size
        reply[4] = 0x41;
        reply[5] = 0x00; // id
        reply[6] = 0x01; // transparent EF
        reply[11] = 0x01; // activated
        reply[12] = 0x03; // compact trailer
        reply.extend_from_slice(&OK);
        reply
    }

    #[test]
    fn test_full_path_traversal_sequence() {
        let transport = MockTransport::with_responses([OK.to_vec(), OK.to_vec(), OK.to_vec()]);
        let mut card = Card::new(transport);
        let path: Path = "3F0041008300".parse().unwrap();

        card.select(&path, false).unwrap();

        let transport = card.transport();
        assert_eq!(transport.transmitted.len(), 3);
        assert_eq!(transport.transmitted[0].as_ref(), b"\xC0\xA4\x00\x00\x02\x3F\x00");
        assert_eq!(transport.transmitted[1].as_ref(), b"\xC0\xA4\x00\x00\x02\x41\x00");
        assert_eq!(transport.transmitted[2].as_ref(), b"\xC0\xA4\x00\x00\x02\x83\x00");
        assert_eq!(transport.lock_count, 1);
        assert_eq!(transport.lock_depth, 0);
    }

    #[test]
    fn test_path_not_at_root_selects_root_first() {
        let transport =
            MockTransport::with_responses([OK.to_vec(), OK.to_vec(), OK.to_vec()]);
        let mut card = Card::new(transport);
        let path: Path = "41008300".parse().unwrap();

        card.select(&path, false).unwrap();

        let transmitted = &card.transport().transmitted;
        assert_eq!(transmitted.len(), 3);
        assert_eq!(transmitted[0].as_ref(), b"\xC0\xA4\x00\x00\x02\x3F\x00");
        assert_eq!(transmitted[1].as_ref(), b"\xC0\xA4\x00\x00\x02\x41\x00");
    }

    #[test]
    fn test_odd_path_fails_before_any_transmit() {
        let mut card = Card::new(MockTransport::new());
        let path = Path::full(vec![0x3F, 0x00, 0x41]);

        assert!(matches!(
            card.select(&path, false),
            Err(Error::InvalidArguments(_))
        ));
        assert!(card.transport().transmitted.is_empty());
        assert_eq!(card.transport().lock_count, 0);
    }

    #[test]
    fn test_lock_released_on_failing_traversal() {
        // Intermediate select fails with file-not-found
        let transport = MockTransport::with_responses([vec![0x6A, 0x82]]);
        let mut card = Card::new(transport);
        let path: Path = "3F0041008300".parse().unwrap();

        assert!(matches!(
            card.select(&path, false),
            Err(Error::Card(CardError::FileNotFound))
        ));
        assert_eq!(card.transport().lock_count, 1);
        assert_eq!(card.transport().lock_depth, 0);
    }

    #[test]
    fn test_bare_root_select_is_direct() {
        let transport = MockTransport::with_responses([OK.to_vec()]);
        let mut card = Card::new(transport);

        card.select(&Path::mf(), false).unwrap();

        assert_eq!(card.transport().transmitted.len(), 1);
        assert_eq!(card.transport().lock_count, 0);
    }

    #[test]
    fn test_select_with_metadata_decodes_descriptor() {
        let transport = MockTransport::with_responses([select_reply()]);
        let mut card = Card::new(transport);

        let descriptor = card
            .select(&Path::file_id(0x4100), true)
            .unwrap()
            .unwrap();

        assert_eq!(descriptor.id, 0x4100);
        assert_eq!(descriptor.size, 0x20);
        assert_eq!(descriptor.structure, Some(EfStructure::Transparent));
        assert_eq!(descriptor.status, FileStatus::Activated);
        // Final select carries an Le byte asking for metadata
        assert_eq!(
            card.transport().transmitted[0].as_ref(),
            b"\xC0\xA4\x00\x00\x02\x41\x00\x00"
        );
    }

    #[test]
    fn test_short_metadata_reply() {
        let transport = MockTransport::with_responses([vec![0x00, 0x01, 0x90, 0x00]]);
        let mut card = Card::new(transport);

        assert!(matches!(
            card.select(&Path::file_id(0x4100), true),
            Err(Error::UnknownReply)
        ));
    }

    #[test]
    fn test_list_files_fills_buffer() {
        let page = |id: [u8; 2]| vec![0x00, 0x00, id[0], id[1], 0x90, 0x00];
        let transport = MockTransport::with_responses([
            page([0x2F, 0x00]),
            page([0x41, 0x00]),
            page([0x50, 0x15]),
            vec![0x6A, 0x82],
        ]);
        let mut card = Card::new(transport);
        let mut buf = [0u8; 6];

        let count = card.list_files(&mut buf).unwrap();

        assert_eq!(count, 6);
        assert_eq!(buf, [0x2F, 0x00, 0x41, 0x00, 0x50, 0x15]);
    }

    #[test]
    fn test_list_files_stops_at_sentinel() {
        let transport = MockTransport::with_responses([
            vec![0x00, 0x00, 0x2F, 0x00, 0x90, 0x00],
            vec![0x6A, 0x82],
        ]);
        let mut card = Card::new(transport);
        let mut buf = [0u8; 8];

        let count = card.list_files(&mut buf).unwrap();

        assert_eq!(count, 2);
        assert_eq!(&buf[..2], &[0x2F, 0x00]);
    }

    #[test]
    fn test_list_files_short_page_is_illegal() {
        let transport =
            MockTransport::with_responses([vec![0x00, 0x00, 0x2F, 0x90, 0x00]]);
        let mut card = Card::new(transport);
        let mut buf = [0u8; 6];

        assert!(matches!(
            card.list_files(&mut buf),
            Err(Error::IllegalResponse {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_delete_requires_bare_file_id() {
        let mut card = Card::new(MockTransport::new());

        assert!(matches!(
            card.delete_file(&Path::mf()),
            Err(Error::InvalidArguments(_))
        ));
        assert!(card.transport().transmitted.is_empty());
    }

    #[test]
    fn test_delete_file_command_shape() {
        let transport = MockTransport::with_responses([OK.to_vec()]);
        let mut card = Card::new(transport);

        card.delete_file(&Path::file_id(0x4101)).unwrap();

        assert_eq!(
            card.transport().transmitted[0].as_ref(),
            b"\xF0\xE4\x00\x00\x02\x41\x01"
        );
    }

    #[test]
    fn test_create_aborts_before_transmit_on_bad_acl() {
        let mut card = Card::new(MockTransport::new());
        let descriptor = FileDescriptor {
            size: 0x10,
            id: 0x4101,
            kind: FileKind::WorkingEf,
            structure: Some(EfStructure::Transparent),
            acl: Default::default(), // everything Unknown
            status: FileStatus::Activated,
            record_length: 0,
            record_count: 0,
        };

        assert!(matches!(
            card.create_file(&descriptor),
            Err(Error::InvalidAcl(_))
        ));
        assert!(card.transport().transmitted.is_empty());
    }

    #[test]
    fn test_create_record_file_passes_record_count() {
        let mut acl = crate::acl::AccessConditions::default();
        acl.set(Operation::Read, AccessCondition::None);
        acl.set(Operation::Update, AccessCondition::Pin1);
        acl.set(Operation::Rehabilitate, AccessCondition::None);
        acl.set(Operation::Invalidate, AccessCondition::None);
        let descriptor = FileDescriptor {
            size: 0x40,
            id: 0x4102,
            kind: FileKind::WorkingEf,
            structure: Some(EfStructure::LinearFixed),
            acl,
            status: FileStatus::Activated,
            record_length: 0x08,
            record_count: 8,
        };
        let transport = MockTransport::with_responses([OK.to_vec()]);
        let mut card = Card::new(transport);

        card.create_file(&descriptor).unwrap();

        let frame = &card.transport().transmitted[0];
        assert_eq!(frame[0], 0xF0);
        assert_eq!(frame[1], 0xE0);
        assert_eq!(frame[3], 8); // record count in P2
        assert_eq!(frame[4], 17); // extended layout with record length
    }

    #[test]
    fn test_read_file_chunks_to_size() {
        let mut body = vec![0xABu8; 0x20];
        body.extend_from_slice(&OK);
        let transport = MockTransport::with_responses([select_reply(), body]);
        let mut card = Card::new(transport);

        let data = card.read_file(&Path::file_id(0x4100)).unwrap();

        assert_eq!(data.len(), 0x20);
        assert!(data.iter().all(|&b| b == 0xAB));
        // Read command asks for exactly the remaining size
        assert_eq!(
            card.transport().transmitted[1].as_ref(),
            b"\xC0\xB0\x00\x00\x20"
        );
    }
}
