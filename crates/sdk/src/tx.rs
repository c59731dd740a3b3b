//! Namespace policy transaction construction.

use fxconfig_proto::protoblocktx::{NamespacePolicy, ReadWrite, Tx, TxNamespace};
use prost::Message;

/// Reserved namespace whose keys hold the policies of all other namespaces.
pub const META_NAMESPACE_ID: &str = "_meta";

/// Reserved namespace holding channel configuration.
pub const CONFIG_NAMESPACE_ID: &str = "_config";

/// Signature scheme recorded in every policy this crate produces.
pub const POLICY_SCHEME: &str = "ECDSA";

/// Builds the unsigned transaction that installs a namespace policy.
///
/// The transaction has a single entry targeting [`META_NAMESPACE_ID`] at
/// version 0, holding one read-write keyed by `namespace_id` whose value is the
/// serialized [`NamespacePolicy`]. The write carries `version` only when it is
/// `>= 0`; `-1` leaves it unset so the ledger treats the key as new.
///
/// The id and signatures are left empty for the envelope signer to fill in.
#[must_use]
pub fn build_namespace_tx(scheme: &str, public_key: &[u8], namespace_id: &str, version: i64) -> Tx {
    let policy = NamespacePolicy { scheme: scheme.to_owned(), public_key: public_key.to_vec() };

    let write = ReadWrite {
        key: namespace_id.as_bytes().to_vec(),
        version: u64::try_from(version).ok(),
        value: policy.encode_to_vec(),
    };

    let entry = TxNamespace {
        ns_id: META_NAMESPACE_ID.to_owned(),
        // The meta namespace version is not tracked by this client.
        ns_version: 0,
        reads_only: Vec::new(),
        read_writes: vec![write],
        blind_writes: Vec::new(),
    };

    Tx { id: String::new(), namespaces: vec![entry], signatures: Vec::new() }
}
