//! Forwarding of fragment streams to gRPC response channels.
//!
//! - [`coordinator`] - Blocking producer loop feeding one response stream.

pub mod coordinator;
