//! Identity emulation build pass.
//!
//! [`build`] walks the card once: token information, the static PIN table,
//! generic data objects, then the certificate slots from which the RSA key
//! pairs are derived. Per-slot problems (unreadable or unparseable
//! certificate, unsupported algorithm) skip that slot; descriptor emission
//! failures abort the whole pass with the store cleared.

use bytes::Bytes;
use rsa::traits::PublicKeyParts;
use tracing::{debug, warn};

use tessera_card::{Card, CardTransport, Path};

use crate::certificate::{
    CertificateParser, KeyAlgorithm, OID_KEY_USAGE, ParsedCertificate, PublicKeyInfo,
};
use crate::control::{CardControl, ObjectRecord};
use crate::error::{Error, Result};
use crate::pins::{PIN_TEMPLATES, primary_auth_id};
use crate::store::{
    CertificateObject, DataObject, IdentityStore, ObjectFlags, ObjectId, PrivateKeyDescriptor,
    PublicKeyDescriptor, TokenInfo,
};
use crate::usage::{CertUsage, map_usage};

/// Manufacturer reported in token information
const MANUFACTURER: &str = "Tessera Project";

/// Serial number used when the card will not report one
const DEFAULT_SERIAL: &str = "00000000";

/// Read access to card file bodies.
///
/// The builder never drives the file system itself; the card driver facade
/// implements this boundary.
pub trait FileReader {
    /// Read the whole body of the file at `path`
    fn read_file(&mut self, path: &Path) -> tessera_card::Result<Vec<u8>>;
}

impl<T: CardTransport> FileReader for Card<T> {
    fn read_file(&mut self, path: &Path) -> tessera_card::Result<Vec<u8>> {
        Self::read_file(self, path)
    }
}

/// One certificate slot while the build pass works on it.
///
/// Created from the enumeration record; the certificate body is fetched once
/// and cached here, and the key material derived from it moves into the
/// emitted descriptors.
struct CredentialSlot {
    id: ObjectId,
    label: String,
    path: Path,
    certificate: Option<Bytes>,
}

impl CredentialSlot {
    fn new(record: ObjectRecord) -> Self {
        // The card addresses keys relative to the root; 1- and 2-byte paths
        // must be normalized before the path selector sees them.
        let path = if !record.path.is_empty() && record.path.len() <= 2 {
            record.path.rebase_under_root()
        } else {
            record.path
        };
        Self {
            id: record.id,
            label: record.label,
            path,
            certificate: None,
        }
    }

    /// The certificate object this slot turns into; the path is cleared
    /// because the body is cached inline.
    fn into_certificate_object(self) -> CertificateObject {
        CertificateObject {
            id: self.id,
            label: self.label,
            value: self.certificate.unwrap_or_default(),
            path: None,
        }
    }
}

/// Why a slot did not produce objects
enum SlotError {
    /// Recoverable, already logged; the pass continues with the next slot
    Skip,
    /// Fatal to the whole pass
    Fatal(Error),
}

/// Build the emulated identity objects for the card behind `control` and
/// `reader`, emitting into `store`.
///
/// Fails with [`Error::WrongCard`] when the card is not an identity card.
/// On any fatal failure the store is cleared before the error propagates, so
/// a failed pass never leaves a half-populated store behind.
pub fn build<C, R, P, S>(
    control: &mut C,
    reader: &mut R,
    parser: &P,
    store: &mut S,
) -> Result<TokenInfo>
where
    C: CardControl + ?Sized,
    R: FileReader + ?Sized,
    P: CertificateParser + ?Sized,
    S: IdentityStore + ?Sized,
{
    if !control.card_kind().is_identity() {
        return Err(Error::WrongCard);
    }
    match build_inner(control, reader, parser, store) {
        Ok(token) => Ok(token),
        Err(error) => {
            store.clear();
            Err(error)
        }
    }
}

fn build_inner<C, R, P, S>(
    control: &mut C,
    reader: &mut R,
    parser: &P,
    store: &mut S,
) -> Result<TokenInfo>
where
    C: CardControl + ?Sized,
    R: FileReader + ?Sized,
    P: CertificateParser + ?Sized,
    S: IdentityStore + ?Sized,
{
    let mut token = TokenInfo {
        label: control.card_kind().display_name().to_owned(),
        manufacturer: MANUFACTURER.to_owned(),
        serial_number: DEFAULT_SERIAL.to_owned(),
    };
    match control.serial_number() {
        Ok(serial) => token.serial_number = hex::encode(serial),
        Err(error) => warn!(%error, "card serial unavailable, using default"),
    }

    add_pins(control, store)?;
    add_data_objects(control, store)?;
    add_credentials(control, reader, parser, store, &mut token)?;

    Ok(token)
}

/// The PIN table is static; only the access path comes from the card.
fn add_pins<C, S>(control: &mut C, store: &mut S) -> Result<()>
where
    C: CardControl + ?Sized,
    S: IdentityStore + ?Sized,
{
    for template in PIN_TEMPLATES {
        let path = control.authentication_path()?;
        debug!(label = template.label, %path, "adding pin");
        store.add_pin(template.instantiate(path))?;
    }
    Ok(())
}

/// Enumerate opaque data objects. Iteration failures abort only this
/// category; store failures are fatal. The finalizer runs on every path.
fn add_data_objects<C, S>(control: &mut C, store: &mut S) -> Result<()>
where
    C: CardControl + ?Sized,
    S: IdentityStore + ?Sized,
{
    let count = match control.begin_data_objects() {
        Ok(count) => count,
        Err(error) => {
            warn!(%error, "generic object enumeration unavailable");
            return Ok(());
        }
    };
    debug!(count, "enumerating generic objects");

    let mut outcome: Result<()> = Ok(());
    for index in 0..count {
        let record = match control.next_data_object() {
            Ok(record) => record,
            Err(error) => {
                warn!(index, %error, "generic object iteration failed");
                break;
            }
        };
        debug!(index, label = %record.label, "adding data object");
        if let Err(error) = store.add_data_object(DataObject {
            id: record.id,
            label: record.label,
            path: record.path,
        }) {
            outcome = Err(error.into());
            break;
        }
    }

    let finished = control.finish_data_objects();
    outcome?;
    finished?;
    Ok(())
}

/// Enumerate certificate slots and derive the credential objects.
fn add_credentials<C, R, P, S>(
    control: &mut C,
    reader: &mut R,
    parser: &P,
    store: &mut S,
    token: &mut TokenInfo,
) -> Result<()>
where
    C: CardControl + ?Sized,
    R: FileReader + ?Sized,
    P: CertificateParser + ?Sized,
    S: IdentityStore + ?Sized,
{
    let count = match control.begin_certificate_objects() {
        Ok(count) => count,
        Err(error) => {
            warn!(%error, "certificate enumeration unavailable");
            return Ok(());
        }
    };
    debug!(count, "enumerating certificate slots");

    let mut first_parsed = false;
    let mut outcome: Result<()> = Ok(());
    for index in 0..count {
        let record = match control.next_certificate_object() {
            Ok(record) => record,
            Err(error) => {
                warn!(index, %error, "certificate iteration failed");
                break;
            }
        };
        match build_slot(reader, parser, store, token, &mut first_parsed, index, record) {
            Ok(()) | Err(SlotError::Skip) => {}
            Err(SlotError::Fatal(error)) => {
                outcome = Err(error);
                break;
            }
        }
    }

    // The card-side iteration state is released even when a slot was fatal.
    let finished = control.finish_certificate_objects();
    outcome?;
    finished?;
    Ok(())
}

/// Run one certificate slot through read, parse and key derivation.
fn build_slot<R, P, S>(
    reader: &mut R,
    parser: &P,
    store: &mut S,
    token: &mut TokenInfo,
    first_parsed: &mut bool,
    index: usize,
    record: ObjectRecord,
) -> std::result::Result<(), SlotError>
where
    R: FileReader + ?Sized,
    P: CertificateParser + ?Sized,
    S: IdentityStore + ?Sized,
{
    let mut slot = CredentialSlot::new(record);

    let der = match reader.read_file(&slot.path) {
        Ok(bytes) => Bytes::from(bytes),
        Err(error) => {
            warn!(slot = index, %error, "certificate unreadable, skipping slot");
            return Err(SlotError::Skip);
        }
    };
    // Cache the body on the slot; every later consumer uses these bytes
    // instead of going back to the card.
    slot.certificate = Some(der.clone());

    let parsed = match parser.parse(&der) {
        Ok(parsed) => parsed,
        Err(error) => {
            warn!(slot = index, %error, "certificate failed to parse, skipping slot");
            return Err(SlotError::Skip);
        }
    };

    // The first certificate that parses names the token, when it carries a
    // common name. Later certificates never overwrite it.
    if !*first_parsed {
        *first_parsed = true;
        if let Some(name) = parsed.subject.common_name() {
            debug!(slot = index, label = name, "token label from certificate subject");
            token.label = name.to_owned();
        }
    }

    let usage = parsed
        .bit_string_extension(&OID_KEY_USAGE)
        .map(CertUsage::from_bits)
        .unwrap_or(CertUsage::DEFAULT);

    let ParsedCertificate { key, .. } = parsed;
    let rsa = match key {
        PublicKeyInfo::Rsa(key) => key,
        PublicKeyInfo::Unsupported(algorithm) => {
            warn!(slot = index, %algorithm, "unsupported key algorithm, skipping slot");
            return Err(SlotError::Skip);
        }
    };

    let (public_usage, private_usage) = map_usage(usage, KeyAlgorithm::Rsa);
    let modulus_bits = rsa.size() * 8;
    let key_reference = slot.id.key_reference();
    debug!(
        slot = index,
        id = %slot.id,
        modulus_bits,
        cert_usage = usage.bits(),
        "deriving key pair"
    );

    // Emission failures from here on are fatal to the whole pass. The key
    // material moves into the public key descriptor; nothing else holds it
    // afterwards.
    store
        .add_rsa_public_key(PublicKeyDescriptor {
            id: slot.id.clone(),
            label: slot.label.clone(),
            key_reference,
            usage: public_usage,
            modulus_bits,
            key: rsa,
            native: true,
        })
        .map_err(|error| SlotError::Fatal(error.into()))?;

    store
        .add_rsa_private_key(PrivateKeyDescriptor {
            id: slot.id.clone(),
            label: slot.label.clone(),
            key_reference,
            usage: private_usage,
            modulus_bits,
            path: slot.path.clone(),
            auth_id: primary_auth_id(),
            object_flags: ObjectFlags::PRIVATE,
            native: true,
        })
        .map_err(|error| SlotError::Fatal(error.into()))?;

    store
        .add_certificate(slot.into_certificate_object())
        .map_err(|error| SlotError::Fatal(error.into()))?;

    Ok(())
}
