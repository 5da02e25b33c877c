use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use osmshard_tonic_core::osmshard::{OsmFile, Partitions};
use std::path::PathBuf;

/// Runtime configuration for the `osmshard-server` binary.
///
/// Every option can also be supplied through the environment variable named
/// next to it, including from a `.env` file in the working directory.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "osmshard-server",
    version,
    about = "Partitions an OSM road graph and streams each worker its fragment over gRPC"
)]
pub struct CliArgs {
    /// OpenStreetMap XML export describing the road graph.
    ///
    /// The file is re-read for every fragment stream and must stay in place
    /// while the server runs.
    ///
    /// Environment variable: `GRAPH_PATH`
    #[arg(long, env = "GRAPH_PATH")]
    pub graph_path: PathBuf,

    /// JSON array of partition regions, in priority order. Partition `i` is
    /// served to worker `i + 1`.
    ///
    /// Example: `[{"bbox": [13.0, 52.3, 13.4, 52.7]}, {"polygon": [[13.4,
    /// 52.3], [13.8, 52.3], [13.8, 52.7]]}]`
    ///
    /// Environment variable: `PARTITIONS_PATH`
    #[arg(long, env = "PARTITIONS_PATH")]
    pub partitions_path: PathBuf,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/osmshard.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Number of fragments buffered between a stream's producer and the
    /// client. The producer pauses while the buffer is full.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 256)]
    pub stream_buffer_size: usize,

    /// Index every node at startup so edge endpoints outside the requested
    /// partition are resolved without rescanning the graph. Trades memory
    /// proportional to the node count for much faster streams.
    ///
    /// Environment variable: `INDEX_NODES`
    #[arg(long, env = "INDEX_NODES", default_value_t = false)]
    pub index_nodes: bool,

    /// Seconds to wait for in-flight streams on shutdown before cancelling
    /// them.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub graph: OsmFile,
    pub partitions: Partitions,
    pub server_addr: String,
    pub uds: bool,
    pub stream_buffer_size: usize,
    pub index_nodes: bool,
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            stream_buffer_size: self.stream_buffer_size,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

/// The part of [`ServerConfig`] the gRPC service itself needs.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    pub stream_buffer_size: usize,
    pub shutdown_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            stream_buffer_size: 256,
            shutdown_timeout: Duration::from_secs(3),
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        let graph = OsmFile::open(&args.graph_path)
            .with_context(|| format!("cannot read graph {}", args.graph_path.display()))?;
        let partitions = Partitions::from_path(&args.partitions_path).with_context(|| {
            format!(
                "cannot load partitions from {}",
                args.partitions_path.display()
            )
        })?;

        Ok(Self {
            graph,
            partitions,
            server_addr: args.server_addr,
            uds: args.uds,
            stream_buffer_size: args.stream_buffer_size,
            index_nodes: args.index_nodes,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}
