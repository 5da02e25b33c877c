#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Lets downstream crates reach the domain types as
// `osmshard_tonic_core::osmshard`.
pub use osmshard;
