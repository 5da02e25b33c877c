use osmshard_tonic_core::{
    Error,
    osmshard::{self, Fragment},
    proto::GraphPiece,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Counts of what a finished stream delivered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub nodes: u64,
    pub edges: u64,
    pub cross_partition_edges: u64,
}

impl StreamSummary {
    fn record(&mut self, fragment: &Fragment) {
        match fragment {
            Fragment::Node(_) => self.nodes += 1,
            Fragment::Edge(edge) => {
                self.edges += 1;
                if edge.is_cross_partition() {
                    self.cross_partition_edges += 1;
                }
            }
        }
    }
}

/// Drives a fragment stream to completion, forwarding every fragment to the
/// client as soon as it is produced.
///
/// Runs on a blocking thread: pulling a fragment may read the graph source
/// and sending waits for room in the bounded response channel.
///
/// # Behavior
///
/// - Before each fragment, stops if the client has gone away
///   ([`Error::RequestCancelled`]) or the service is shutting down
///   ([`Error::ServiceShutdown`], also reported to the client).
/// - A domain error is sent to the client as the final item of the stream
///   and returned. Fragments sent before it stay delivered.
pub fn feed_fragments<I>(
    fragments: I,
    resp_tx: &mpsc::Sender<Result<GraphPiece, Status>>,
    shutdown: &CancellationToken,
) -> osmshard_tonic_core::Result<StreamSummary>
where
    I: IntoIterator<Item = osmshard::Result<Fragment>>,
{
    let mut summary = StreamSummary::default();
    let mut fragments = fragments.into_iter();

    loop {
        if resp_tx.is_closed() {
            return Err(Error::RequestCancelled);
        }
        if shutdown.is_cancelled() {
            // The client may not be reading; never block on the final status.
            let _ = resp_tx.try_send(Err(Error::ServiceShutdown.into()));
            return Err(Error::ServiceShutdown);
        }

        let Some(next) = fragments.next() else {
            return Ok(summary);
        };

        match next {
            Ok(fragment) => {
                summary.record(&fragment);
                if resp_tx.blocking_send(Ok(fragment.into())).is_err() {
                    return Err(Error::RequestCancelled);
                }
            }
            Err(e) => {
                let err = Error::from(e);
                // Best effort: the client may have disconnected as well.
                if let Err(_e) = resp_tx.blocking_send(Err(err.clone().into())) {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Failed to forward err: {}", _e);
                }
                return Err(err);
            }
        }
    }
}
