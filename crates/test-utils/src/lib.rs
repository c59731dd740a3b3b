//! Shared test utilities for fxconfig crates.
//!
//! - [`TestDir`] - Managed temporary directory with path helpers
//! - [`TestMsp`] - A local MSP directory holding the fixture identity
//! - [`fixtures`] - PEM keys and certificates
//! - [`assert_eventually`] - Poll a condition until it's true or timeout
//! - [`strategies`] - Proptest generators for deployment requests

#![deny(unsafe_code)]

mod test_dir;
pub use test_dir::TestDir;

mod assertions;
pub use assertions::assert_eventually;

mod msp;
pub use msp::TestMsp;

pub mod fixtures;
pub mod strategies;
