//! Error type of the coordinator service.
//!
//! `From<Error> for Status` decides the status code a client observes:
//!
//! - `Graph(UnknownWorker)` is the caller's fault and maps to
//!   `INVALID_ARGUMENT`. It is raised before a stream starts.
//! - Every other `Graph` error aborts the stream it occurred in. The status
//!   message carries the error and its source chain for operators.
//! - `ServiceShutdown` maps to `UNAVAILABLE` so clients retry elsewhere.

use core::fmt::Write;
use std::error::Error as _;
use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The graph could not be partitioned or streamed.
    #[error(transparent)]
    Graph(#[from] osmshard::Error),

    /// The client went away mid-stream.
    #[error("Request cancelled by client")]
    RequestCancelled,

    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// The error followed by every underlying source, outermost first.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            let _ = write!(out, ": {cause}");
            source = cause.source();
        }
        out
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Graph(e @ osmshard::Error::UnknownWorker { .. }) => {
                Status::invalid_argument(e.to_string())
            }
            Error::Graph(ref e) => {
                Status::aborted(format!("What: {e}, Trace: {}", err.chain()))
            }
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;
    use tonic::Code;

    #[test]
    fn unknown_worker_is_invalid_argument() {
        let status = Status::from(Error::from(osmshard::Error::UnknownWorker {
            worker_id: 7,
            partitions: 2,
        }));
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().contains('7'), "{}", status.message());
    }

    #[test]
    fn stream_errors_abort_with_diagnostics() {
        let status = Status::from(Error::from(osmshard::Error::NodeNotFound { node_id: 42 }));
        assert_eq!(status.code(), Code::Aborted);
        assert!(status.message().starts_with("What: "));
        assert!(status.message().contains("42"), "{}", status.message());

        let status = Status::from(Error::from(osmshard::Error::MalformedWay {
            line: 12,
            reason: "dangling end marker".into(),
        }));
        assert_eq!(status.code(), Code::Aborted);
        assert!(status.message().contains("dangling end marker"));
    }

    #[test]
    fn io_errors_carry_their_source() {
        let err = Error::from(osmshard::Error::Io(Arc::new(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated graph",
        ))));
        assert!(err.chain().contains("truncated graph"), "{}", err.chain());

        let status = Status::from(err);
        assert_eq!(status.code(), Code::Aborted);
        assert!(status.message().contains("truncated graph"));
    }

    #[test]
    fn service_errors_map_to_transport_codes() {
        assert_eq!(Status::from(Error::ServiceShutdown).code(), Code::Unavailable);
        assert_eq!(Status::from(Error::RequestCancelled).code(), Code::Cancelled);
    }
}
