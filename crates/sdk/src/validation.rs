//! Request validation that runs before any cryptographic or network work.
//!
//! ## Namespace identifiers
//!
//! Namespace ids must be 1 to 60 bytes of `[a-z0-9_]`. They become keys in the
//! meta namespace and table names on the committing side, so upper case,
//! punctuation and whitespace are rejected. The reserved system namespaces
//! (`_meta`, `_config`) fall inside the charset and are accepted.

use snafu::ensure;

use crate::config::{CREATE_VERSION, NamespaceConfig};
use crate::error::{ConfigSnafu, Result};

/// Maximum namespace id length in bytes.
pub const MAX_NAMESPACE_ID_BYTES: usize = 60;

/// Validates a namespace identifier.
///
/// # Errors
///
/// Returns [`Error::Config`](crate::Error::Config) if the id is empty, longer
/// than [`MAX_NAMESPACE_ID_BYTES`], or contains characters outside `[a-z0-9_]`.
pub fn validate_namespace_id(namespace_id: &str) -> Result<()> {
    ensure!(!namespace_id.is_empty(), ConfigSnafu { message: "namespace ID is empty" });
    ensure!(
        namespace_id.len() <= MAX_NAMESPACE_ID_BYTES,
        ConfigSnafu {
            message: format!(
                "namespace ID length {} bytes exceeds maximum {MAX_NAMESPACE_ID_BYTES} bytes",
                namespace_id.len()
            ),
        }
    );
    if let Some(pos) = namespace_id.find(|c: char| !is_namespace_char(c)) {
        return ConfigSnafu {
            message: format!(
                "namespace ID contains invalid character {:?} at byte offset {pos}; allowed: [a-z0-9_]",
                namespace_id[pos..].chars().next().unwrap_or('\0'),
            ),
        }
        .fail();
    }
    Ok(())
}

/// Validates a namespace request.
///
/// Pure: touches neither the signer nor the network.
///
/// # Errors
///
/// Returns [`Error::Config`](crate::Error::Config) if the namespace id is
/// invalid, the channel is empty, or the version is below `-1`.
pub fn validate(config: &NamespaceConfig) -> Result<()> {
    validate_namespace_id(config.namespace_id())?;
    ensure!(
        !config.channel().is_empty(),
        ConfigSnafu { message: "you must specify a channel name '--channel channelName'" }
    );
    ensure!(
        config.version() >= CREATE_VERSION,
        ConfigSnafu {
            message: format!("version {} is invalid; use -1 to create or >= 0 to update", config.version()),
        }
    );
    Ok(())
}

fn is_namespace_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::Error;

    #[test]
    fn test_valid_ids() {
        for id in ["1", "ns1", "token_ns", "a", "_meta", "_config"] {
            assert!(validate_namespace_id(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn test_empty_id_rejected() {
        let err = validate_namespace_id("").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_whitespace_rejected() {
        let err = validate_namespace_id("invalid namespace").unwrap_err();
        assert!(err.to_string().contains("' '"), "got: {err}");
    }

    #[test]
    fn test_uppercase_and_punctuation_rejected() {
        for id in ["NS1", "ns-1", "ns.1", "ns/1", "ns:1", "nś"] {
            assert!(validate_namespace_id(id).is_err(), "{id} should be rejected");
        }
    }

    #[test]
    fn test_length_limit() {
        let max = "a".repeat(MAX_NAMESPACE_ID_BYTES);
        assert!(validate_namespace_id(&max).is_ok());
        let over = "a".repeat(MAX_NAMESPACE_ID_BYTES + 1);
        assert!(validate_namespace_id(&over).is_err());
    }

    #[test]
    fn test_validate_request() {
        assert!(validate(&NamespaceConfig::create("mychannel", "ns1")).is_ok());
        assert!(validate(&NamespaceConfig::update("mychannel", "ns1", 3)).is_ok());
    }

    #[test]
    fn test_validate_empty_channel() {
        let err = validate(&NamespaceConfig::create("", "ns1")).unwrap_err();
        assert!(err.to_string().contains("--channel"), "got: {err}");
    }

    #[test]
    fn test_validate_version_below_create() {
        let err = validate(&NamespaceConfig::new("mychannel", "ns1", -2)).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    proptest! {
        #[test]
        fn prop_charset_ids_accepted(id in "[a-z0-9_]{1,60}") {
            prop_assert!(validate_namespace_id(&id).is_ok());
        }

        #[test]
        fn prop_ids_with_whitespace_rejected(
            prefix in "[a-z0-9_]{0,20}",
            ws in prop::sample::select(vec![' ', '\t', '\n']),
            suffix in "[a-z0-9_]{0,20}",
        ) {
            let id = format!("{prefix}{ws}{suffix}");
            prop_assert!(validate_namespace_id(&id).is_err());
        }
    }
}
