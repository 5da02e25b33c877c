//! Protocol bindings, wire conversions and the service error type.

pub mod convert;
pub mod error;

pub use error::{Error, Result};

pub mod proto {
    tonic::include_proto!("manager");
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("manager_descriptor");
}
