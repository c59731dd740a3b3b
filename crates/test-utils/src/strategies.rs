//! Proptest strategies for namespace deployment requests.
//!
//! ```no_run
//! use fxconfig_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(id in strategies::arb_namespace_id(), version in strategies::arb_version()) {
//!         // build a request and check an invariant
//!     }
//! }
//! ```

use proptest::prelude::*;

/// Longest namespace id the ledger accepts, in bytes.
pub const MAX_NAMESPACE_ID_LEN: usize = 60;

/// Size of a signature header nonce.
pub const NONCE_LEN: usize = 24;

/// Generates a valid namespace id: 1-60 characters from `[a-z0-9_]`.
pub fn arb_namespace_id() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,60}"
}

/// Generates a namespace id that must be rejected.
///
/// Covers the empty id, ids over the length limit, and ids containing an
/// uppercase letter, whitespace or punctuation.
pub fn arb_invalid_namespace_id() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[a-z0-9_]{61,80}",
        ("[a-z0-9_]{0,10}", "[A-Z \t\n.:/-]", "[a-z0-9_]{0,10}")
            .prop_map(|(prefix, bad, suffix)| format!("{prefix}{bad}{suffix}")),
    ]
}

/// Generates a request version: `-1` (create) or an existing version.
pub fn arb_version() -> impl Strategy<Value = i64> {
    prop_oneof![Just(-1i64), 0i64..1_000_000, Just(i64::MAX)]
}

/// Generates a channel name.
pub fn arb_channel() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9.-]{0,29}"
}

/// Generates a signature header nonce.
pub fn arb_nonce() -> impl Strategy<Value = [u8; NONCE_LEN]> {
    any::<[u8; NONCE_LEN]>()
}

/// Generates two distinct nonces.
pub fn arb_distinct_nonces() -> impl Strategy<Value = ([u8; NONCE_LEN], [u8; NONCE_LEN])> {
    (arb_nonce(), arb_nonce()).prop_filter("nonces must differ", |(a, b)| a != b)
}
