//! Canonical DER encoding of a transaction entry for per-namespace signing.
//!
//! Each namespace entry of a transaction is signed independently. The signed
//! bytes are the DER encoding of:
//!
//! ```text
//! SEQUENCE {
//!   txId         String,
//!   namespaceId  String,
//!   nsVersion    INTEGER,
//!   readsOnly    SEQUENCE OF SEQUENCE { key OCTET STRING, version INTEGER DEFAULT -1 },
//!   readWrites   SEQUENCE OF SEQUENCE { key OCTET STRING, value OCTET STRING, version INTEGER DEFAULT -1 },
//!   blindWrites  SEQUENCE OF SEQUENCE { key OCTET STRING, value OCTET STRING }
//! }
//! ```
//!
//! `String` is a `PrintableString` when every character is in the printable
//! set and a `UTF8String` otherwise. Binding the transaction id into every
//! entry makes a signature valid for exactly one transaction.

use der::asn1::{OctetString, PrintableString};
use der::{Decode, Encode, EncodeValue, Length, Reader, Sequence, Tag, Tagged, Writer};
use fxconfig_proto::protoblocktx::{Read, ReadWrite, Tx, Write};

use crate::error::{EncodingSnafu, Result};

/// Encoded version of a key that has no prior version.
const NO_VERSION: i64 = -1;

fn no_version() -> i64 {
    NO_VERSION
}

/// A string encoded as `PrintableString` when possible and `UTF8String`
/// otherwise.
#[derive(Clone, Debug, Eq, PartialEq)]
enum Asn1String {
    Printable(PrintableString),
    Utf8(String),
}

impl Asn1String {
    fn new(value: &str) -> Result<Self> {
        if value.bytes().all(is_printable) {
            let printable = PrintableString::new(value).map_err(encoding_error)?;
            Ok(Self::Printable(printable))
        } else {
            Ok(Self::Utf8(value.to_owned()))
        }
    }

    #[cfg(test)]
    fn as_str(&self) -> &str {
        match self {
            Self::Printable(s) => s.as_str(),
            Self::Utf8(s) => s.as_str(),
        }
    }
}

impl EncodeValue for Asn1String {
    fn value_len(&self) -> der::Result<Length> {
        match self {
            Self::Printable(s) => s.value_len(),
            Self::Utf8(s) => s.value_len(),
        }
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        match self {
            Self::Printable(s) => s.encode_value(writer),
            Self::Utf8(s) => s.encode_value(writer),
        }
    }
}

impl<'a> Decode<'a> for Asn1String {
    fn decode<R: Reader<'a>>(reader: &mut R) -> der::Result<Self> {
        match reader.peek_tag()? {
            Tag::PrintableString => PrintableString::decode(reader).map(Self::Printable),
            Tag::Utf8String => String::decode(reader).map(Self::Utf8),
            tag => Err(tag.unexpected_error(None)),
        }
    }
}

impl Tagged for Asn1String {
    fn tag(&self) -> Tag {
        match self {
            Self::Printable(_) => Tag::PrintableString,
            Self::Utf8(_) => Tag::Utf8String,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct Asn1Read {
    key: OctetString,
    #[asn1(default = "no_version")]
    version: i64,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct Asn1ReadWrite {
    key: OctetString,
    value: OctetString,
    #[asn1(default = "no_version")]
    version: i64,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct Asn1Write {
    key: OctetString,
    value: OctetString,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct Asn1Namespace {
    tx_id: Asn1String,
    namespace_id: Asn1String,
    namespace_version: i64,
    reads_only: Vec<Asn1Read>,
    read_writes: Vec<Asn1ReadWrite>,
    blind_writes: Vec<Asn1Write>,
}

/// Returns the DER bytes signed for namespace entry `index` of `tx`.
///
/// # Errors
///
/// Returns [`Error::Encoding`](crate::Error::Encoding) if `index` is out of
/// range, a version does not fit a signed 64-bit integer, or DER encoding fails.
pub fn marshal_tx_namespace(tx: &Tx, index: usize) -> Result<Vec<u8>> {
    let Some(ns) = tx.namespaces.get(index) else {
        return EncodingSnafu {
            message: format!(
                "namespace index {index} out of range ({} entries)",
                tx.namespaces.len()
            ),
        }
        .fail();
    };

    let encoded = Asn1Namespace {
        tx_id: Asn1String::new(&tx.id)?,
        namespace_id: Asn1String::new(&ns.ns_id)?,
        namespace_version: to_signed(ns.ns_version)?,
        reads_only: ns.reads_only.iter().map(encode_read).collect::<Result<_>>()?,
        read_writes: ns.read_writes.iter().map(encode_read_write).collect::<Result<_>>()?,
        blind_writes: ns.blind_writes.iter().map(encode_write).collect::<Result<_>>()?,
    };

    encoded.to_der().map_err(encoding_error)
}

fn encode_read(read: &Read) -> Result<Asn1Read> {
    Ok(Asn1Read { key: octets(&read.key)?, version: optional_version(read.version)? })
}

fn encode_read_write(rw: &ReadWrite) -> Result<Asn1ReadWrite> {
    Ok(Asn1ReadWrite {
        key: octets(&rw.key)?,
        value: octets(&rw.value)?,
        version: optional_version(rw.version)?,
    })
}

fn encode_write(write: &Write) -> Result<Asn1Write> {
    Ok(Asn1Write { key: octets(&write.key)?, value: octets(&write.value)? })
}

fn octets(bytes: &[u8]) -> Result<OctetString> {
    OctetString::new(bytes.to_vec()).map_err(encoding_error)
}

fn optional_version(version: Option<u64>) -> Result<i64> {
    version.map_or(Ok(NO_VERSION), to_signed)
}

fn to_signed(version: u64) -> Result<i64> {
    i64::try_from(version).map_err(|_| {
        EncodingSnafu { message: format!("version {version} exceeds the signed 64-bit range") }
            .build()
    })
}

fn encoding_error(err: der::Error) -> crate::Error {
    EncodingSnafu { message: format!("ASN.1 encoding failed: {err}") }.build()
}

/// PrintableString character set (X.680).
fn is_printable(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(b, b' ' | b'\'' | b'(' | b')' | b'+' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?')
}
