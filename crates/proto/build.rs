//! Build script for fxconfig-proto.
//!
//! The Rust bindings live pre-generated in `src/generated/` so that building the
//! crate does not require `protoc`. Setting `FXCONFIG_REGENERATE_PROTO=1`
//! recompiles the definitions under `proto/` with tonic-prost-build and
//! overwrites the checked-in files.

use std::path::Path;

const PROTOS: &[&str] = &[
    "../../proto/common/common.proto",
    "../../proto/msp/identities.proto",
    "../../proto/orderer/ab.proto",
    "../../proto/protoblocktx/block_tx.proto",
    "../../proto/protoqueryservice/query_service.proto",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo::rerun-if-env-changed=FXCONFIG_REGENERATE_PROTO");

    if std::env::var_os("FXCONFIG_REGENERATE_PROTO").is_none() {
        return Ok(());
    }

    if !PROTOS.iter().all(|p| Path::new(p).exists()) {
        return Err("proto sources not found; regenerate from a repository checkout".into());
    }

    for proto in PROTOS {
        println!("cargo::rerun-if-changed={proto}");
    }

    tonic_prost_build::configure()
        .out_dir("src/generated")
        .build_server(true)
        .build_client(true)
        .compile_protos(PROTOS, &["../../proto"])?;

    Ok(())
}
