//! gRPC entry point of the coordinator.
//!
//! [`CoordinatorService`] implements the generated [`ManagerService`] trait:
//!
//! - `RegisterWorker` and `GetWorkersList` go straight to the shared
//!   [`WorkerRegistry`]. Its lock is held only for the lookup or update.
//! - `GetGraphFragment` validates the worker id, then hands a lazy
//!   [`FragmentStream`](osmshard_tonic_core::osmshard::FragmentStream) to a
//!   blocking producer which feeds a bounded channel read by the client.

use crate::server::{
    config::ServiceConfig,
    service::lifecycle::StreamLifecycle,
    streaming::coordinator::feed_fragments,
    telemetry::{
        increment_edges_streamed, increment_nodes_streamed, increment_requests,
        increment_stream_errors, increment_workers_registered, record_stream_duration,
    },
};
use core::pin::Pin;
use futures::TryStreamExt;
use osmshard_tonic_core::{
    Error,
    osmshard::{FragmentStreamer, GraphSource, WorkerRegistry},
    proto::{
        GraphPiece, WorkerMetadata, WorkerProperties, WorkersList, WorkersListRequest,
        graph_piece::GraphElement, manager_service_server::ManagerService,
    },
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status};

/// Coordinator serving partitions of one graph source.
pub struct CoordinatorService<S: GraphSource> {
    config: ServiceConfig,
    registry: Arc<WorkerRegistry>,
    streamer: FragmentStreamer<S>,
    lifecycle: Arc<StreamLifecycle>,
}

impl<S: GraphSource> Clone for CoordinatorService<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            registry: Arc::clone(&self.registry),
            streamer: self.streamer.clone(),
            lifecycle: Arc::clone(&self.lifecycle),
        }
    }
}

impl<S: GraphSource> CoordinatorService<S> {
    pub fn new(streamer: FragmentStreamer<S>, config: ServiceConfig) -> Self {
        Self {
            config,
            registry: Arc::new(WorkerRegistry::new()),
            streamer,
            lifecycle: Arc::new(StreamLifecycle::new(config.shutdown_timeout)),
        }
    }

    /// Stops accepting streams and waits for in-flight ones, cancelling any
    /// still running after the configured timeout. Returns `true` if nothing
    /// had to be cancelled.
    pub async fn shutdown(&self) -> bool {
        self.lifecycle.shutdown().await
    }
}

#[tonic::async_trait]
impl<S: GraphSource> ManagerService for CoordinatorService<S> {
    type GetGraphFragmentStream = Pin<Box<dyn Stream<Item = Result<GraphPiece, Status>> + Send>>;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(address = %req.get_ref().listening_address)))]
    async fn register_worker(
        &self,
        req: Request<WorkerProperties>,
    ) -> Result<Response<WorkerMetadata>, Status> {
        let address = req.into_inner().listening_address;
        let registration = self.registry.register(address.as_str());
        let worker_id = registration.worker_id();

        if registration.is_new() {
            increment_workers_registered();

            #[cfg(feature = "tracing")]
            {
                tracing::info!(worker_id, "Registered worker");
                let partitions = self.streamer.partitions().len();
                if worker_id as usize > partitions {
                    tracing::warn!(
                        worker_id,
                        partitions,
                        "More workers than partitions; this worker has no fragment to fetch"
                    );
                }
            }
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!(worker_id, "Worker already registered");
        }

        Ok(Response::new(WorkerMetadata { worker_id }))
    }

    /// Streams the fragment owned by the requesting worker.
    ///
    /// Errors before the first fragment (unknown worker, shutting down) are
    /// returned as the RPC status. Errors after it end the stream with an
    /// `ABORTED` status.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(worker_id = req.get_ref().worker_id)))]
    async fn get_graph_fragment(
        &self,
        req: Request<WorkerMetadata>,
    ) -> Result<Response<Self::GetGraphFragmentStream>, Status> {
        let start = Instant::now();
        let worker_id = req.get_ref().worker_id;
        increment_requests();

        let prepared: Result<_, Error> = self.lifecycle.begin().and_then(|guard| {
            let partition = self.streamer.partitions().partition_of(worker_id)?;
            let fragments = self.streamer.stream(partition)?;
            Ok((guard, partition, fragments))
        });
        let (guard, _partition, fragments) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                increment_stream_errors();
                #[cfg(feature = "tracing")]
                tracing::warn!("Rejected fragment request: {}", e);
                return Err(e.into());
            }
        };

        let (resp_tx, resp_rx) =
            mpsc::channel::<Result<GraphPiece, Status>>(self.config.stream_buffer_size);
        let shutdown = self.lifecycle.token();

        #[cfg(feature = "tracing")]
        let span = tracing::info_span!("streaming", worker_id, partition = _partition);

        tokio::task::spawn_blocking(move || {
            #[cfg(feature = "tracing")]
            let _entered = span.enter();
            // Released once the producer stops, whatever the outcome.
            let _guard = guard;

            match feed_fragments(fragments, &resp_tx, &shutdown) {
                Ok(_summary) => {
                    record_stream_duration(start.elapsed().as_millis() as f64);
                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        nodes = _summary.nodes,
                        edges = _summary.edges,
                        cross_partition_edges = _summary.cross_partition_edges,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Fragment stream complete"
                    );
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Error: {}", _e.chain());
                }
            }
        });

        let stream = ReceiverStream::new(resp_rx)
            .inspect_ok(|piece| match piece.graph_element {
                Some(GraphElement::Nodes(_)) => increment_nodes_streamed(1),
                Some(GraphElement::Edges(_)) => increment_edges_streamed(1),
                None => {}
            })
            .inspect_err(|_e| {
                increment_stream_errors();
            });

        Ok(Response::new(Box::pin(stream)))
    }

    async fn get_workers_list(
        &self,
        _req: Request<WorkersListRequest>,
    ) -> Result<Response<WorkersList>, Status> {
        Ok(Response::new(self.registry.list().into_iter().collect()))
    }
}
