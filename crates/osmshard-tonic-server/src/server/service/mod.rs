//! gRPC service implementation.
//!
//! - [`handler`] - `ManagerService` entry point (`CoordinatorService`).
//! - [`lifecycle`] - In-flight stream accounting and graceful shutdown.

pub mod handler;
pub mod lifecycle;
