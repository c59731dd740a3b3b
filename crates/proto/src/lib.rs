//! Protobuf types and gRPC stubs for namespace deployment.
//!
//! This crate provides the wire schema shared with the ordering service and the
//! committer query service:
//! - [`common`]: envelopes, headers and the broadcast [`common::Status`]
//! - [`orderer`]: the `AtomicBroadcast` streaming service
//! - [`msp`]: serialized signing identities
//! - [`protoblocktx`]: transactions and namespace policies
//! - [`protoqueryservice`]: the namespace policy query service
//!
//! Field numbers must stay bit-compatible with the remote schema; the bindings
//! are pre-generated (see `build.rs`).

#![deny(unsafe_code)]
// gRPC services return tonic::Status (176 bytes) - standard practice for gRPC error handling
#![allow(clippy::result_large_err)]

/// Channel envelope and header messages.
pub mod common {
    #![allow(clippy::all)]
    #![allow(missing_docs)]

    include!("generated/common.rs");
}

/// Ordering service broadcast API.
pub mod orderer {
    #![allow(clippy::all)]
    #![allow(missing_docs)]

    include!("generated/orderer.rs");
}

/// Membership service identity messages.
pub mod msp {
    #![allow(clippy::all)]
    #![allow(missing_docs)]

    include!("generated/msp.rs");
}

/// Committer transaction format.
pub mod protoblocktx {
    #![allow(clippy::all)]
    #![allow(missing_docs)]

    include!("generated/protoblocktx.rs");
}

/// Committer query service.
pub mod protoqueryservice {
    #![allow(clippy::all)]
    #![allow(missing_docs)]

    include!("generated/protoqueryservice.rs");
}
