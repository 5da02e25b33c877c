//! # Telemetry Features
//!
//! Console logging through `tracing_subscriber::fmt` is always installed and
//! filtered with `RUST_LOG` (default `info`). OpenTelemetry export is opt-in.
//!
//! ## Feature matrix
//!
//! - `tracing` (default): `tracing` events and spans, plus an OpenTelemetry
//!   tracer provider.
//! - `metrics`: OpenTelemetry counters and histograms.
//! - `otlp`: OTLP/gRPC exporter configured from the environment.
//! - `stdout`: stdout exporter, useful locally.
//!
//! Exporters require at least one of `tracing` or `metrics`.
//!
//! ## OTLP environment
//!
//! - `OTLP_ENDPOINT` (required), e.g. `https://collector:4317`. TLS with the
//!   platform's native roots is used for `https` endpoints.
//! - `OTLP_HEADERS` (optional), comma separated `key=value` pairs sent as
//!   gRPC metadata.
//! - `OTLP_COMPRESSION` (optional): `gzip` (default) or `zstd`.
//!
//! ## Metrics
//!
//! | name | kind |
//! |---|---|
//! | `requests` | counter of GetGraphFragment calls |
//! | `streams_inflight` | up/down counter of open fragment streams |
//! | `errors` | counter of rejected or failed streams |
//! | `stream_duration` | histogram, milliseconds |
//! | `nodes_streamed` | counter of node fragments sent |
//! | `edges_streamed` | counter of edge fragments sent |
//! | `workers_registered` | counter of newly registered workers |
//!
//! ```bash
//! cargo run --features tracing,metrics,otlp
//! cargo run --features metrics,stdout
//! ```

#[cfg(all(feature = "otlp", not(any(feature = "tracing", feature = "metrics"))))]
compile_error!("The 'otlp' feature requires at least one of 'tracing' or 'metrics' to be enabled.");

#[cfg(all(feature = "stdout", not(any(feature = "tracing", feature = "metrics"))))]
compile_error!(
    "The 'stdout' feature requires at least one of 'tracing' or 'metrics' to be enabled."
);

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(all(feature = "otlp", any(feature = "metrics", feature = "tracing")))]
use opentelemetry_otlp::{Compression, Protocol, WithExportConfig, WithTonicConfig};
#[cfg(all(feature = "otlp", feature = "metrics"))]
use opentelemetry_sdk::metrics::Temporality;
#[cfg(feature = "otlp")]
use tonic::metadata::MetadataMap;
#[cfg(all(feature = "otlp", any(feature = "metrics", feature = "tracing")))]
use tonic::transport::ClientTlsConfig;

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "tracing")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::trace as sdktrace;

const SERVICE_NAME: &str = "osmshard";

pub struct TelemetryProviders {
    #[cfg(feature = "tracing")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down every exporter. Failures are reported on
    /// stderr since the subscriber may already be unusable.
    pub fn shutdown(&self) {
        #[cfg(feature = "tracing")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "tracing")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "tracing")]
    let tracer_provider = init_tracer()?;

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics()?;

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    let scope = InstrumentationScope::builder(SERVICE_NAME)
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    // Human readable console output, independent of the stdout exporter.
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        );

    #[cfg(feature = "tracing")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.init();

    Ok(TelemetryProviders {
        #[cfg(feature = "tracing")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(feature = "otlp")]
struct OtlpSettings {
    endpoint: String,
    metadata: MetadataMap,
    compression: Compression,
}

#[cfg(feature = "otlp")]
impl OtlpSettings {
    fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context;
        use std::str::FromStr;
        use tonic::metadata::MetadataKey;

        let endpoint = std::env::var("OTLP_ENDPOINT").context("missing `OTLP_ENDPOINT`")?;

        let mut metadata = MetadataMap::new();
        if let Ok(headers) = std::env::var("OTLP_HEADERS") {
            for pair in headers.split(',').filter(|pair| !pair.trim().is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .with_context(|| format!("`OTLP_HEADERS` entry `{pair}` is not key=value"))?;
                let key = MetadataKey::from_bytes(key.trim().to_ascii_lowercase().as_bytes())
                    .with_context(|| format!("invalid `OTLP_HEADERS` key `{key}`"))?;
                metadata.insert(
                    key,
                    value
                        .trim()
                        .parse()
                        .with_context(|| format!("invalid `OTLP_HEADERS` value for `{pair}`"))?,
                );
            }
        }

        let compression = match std::env::var("OTLP_COMPRESSION") {
            Ok(raw) => Compression::from_str(&raw.to_ascii_lowercase())?,
            Err(_) => Compression::Gzip,
        };

        Ok(Self {
            endpoint,
            metadata,
            compression,
        })
    }

    fn tls(&self) -> Option<ClientTlsConfig> {
        self.endpoint
            .starts_with("https://")
            .then(|| ClientTlsConfig::new().with_native_roots())
    }
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;

        let settings = OtlpSettings::from_env()?;
        let mut exporter = opentelemetry_otlp::MetricExporter::builder().with_tonic();
        if let Some(tls) = settings.tls() {
            exporter = exporter.with_tls_config(tls);
        }
        let exporter = exporter
            .with_metadata(settings.metadata)
            .with_timeout(std::time::Duration::from_secs(10))
            .with_compression(settings.compression)
            .with_endpoint(settings.endpoint)
            .with_protocol(Protocol::Grpc)
            .with_temporality(Temporality::Delta)
            .build()
            .context("failed to build metrics exporter")?;

        builder.with_periodic_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(feature = "tracing")]
fn init_tracer() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::SpanExporter;
        let batch = sdktrace::BatchSpanProcessor::builder(SpanExporter::default())
            .with_batch_config(batch_config())
            .build();
        builder.with_span_processor(batch)
    };

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;

        let settings = OtlpSettings::from_env()?;
        let mut exporter = opentelemetry_otlp::SpanExporter::builder().with_tonic();
        if let Some(tls) = settings.tls() {
            exporter = exporter.with_tls_config(tls);
        }
        let exporter = exporter
            .with_metadata(settings.metadata)
            .with_timeout(std::time::Duration::from_secs(10))
            .with_compression(settings.compression)
            .with_endpoint(settings.endpoint)
            .with_protocol(Protocol::Grpc)
            .build()
            .context("failed to build tracer exporter")?;

        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(batch_config())
            .build();

        builder.with_span_processor(batch)
    };

    Ok(builder.build())
}

#[cfg(all(feature = "tracing", any(feature = "stdout", feature = "otlp")))]
fn batch_config() -> sdktrace::BatchConfig {
    sdktrace::BatchConfigBuilder::default()
        .with_scheduled_delay(std::time::Duration::from_secs(5))
        .with_max_queue_size(2048)
        .build()
}

#[cfg(feature = "metrics")]
static REQUESTS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static STREAMS_INFLIGHT: OnceLock<UpDownCounter<i64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static STREAM_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static STREAM_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static NODES_STREAMED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static EDGES_STREAMED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static WORKERS_REGISTERED: OnceLock<Counter<u64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = REQUESTS.set(
        meter
            .u64_counter("requests")
            .with_description("Total GetGraphFragment requests")
            .build(),
    );

    let _ = STREAMS_INFLIGHT.set(
        meter
            .i64_up_down_counter("streams_inflight")
            .with_description("Concurrent fragment streams")
            .build(),
    );

    let _ = STREAM_ERRORS.set(
        meter
            .u64_counter("errors")
            .with_description("Rejected or failed fragment streams")
            .build(),
    );

    let _ = STREAM_DURATION_MS.set(
        meter
            .f64_histogram("stream_duration")
            .with_unit("ms")
            .with_description("End-to-end fragment stream duration")
            .build(),
    );

    let _ = NODES_STREAMED.set(
        meter
            .u64_counter("nodes_streamed")
            .with_description("Node fragments sent to workers")
            .build(),
    );

    let _ = EDGES_STREAMED.set(
        meter
            .u64_counter("edges_streamed")
            .with_description("Edge fragments sent to workers")
            .build(),
    );

    let _ = WORKERS_REGISTERED.set(
        meter
            .u64_counter("workers_registered")
            .with_description("Distinct worker addresses registered")
            .build(),
    );
}

// No-ops unless the `metrics` feature is enabled.
#[cfg(feature = "metrics")]
pub fn increment_requests() {
    if let Some(counter) = REQUESTS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_requests() {}

#[cfg(feature = "metrics")]
pub fn increment_streams_inflight() {
    if let Some(counter) = STREAMS_INFLIGHT.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_streams_inflight() {}

#[cfg(feature = "metrics")]
pub fn decrement_streams_inflight() {
    if let Some(counter) = STREAMS_INFLIGHT.get() {
        counter.add(-1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn decrement_streams_inflight() {}

#[cfg(feature = "metrics")]
pub fn increment_stream_errors() {
    if let Some(counter) = STREAM_ERRORS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_stream_errors() {}

#[cfg(feature = "metrics")]
pub fn record_stream_duration(duration_ms: f64) {
    if let Some(histogram) = STREAM_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_stream_duration(_duration_ms: f64) {}

#[cfg(feature = "metrics")]
pub fn increment_nodes_streamed(count: u64) {
    if let Some(counter) = NODES_STREAMED.get() {
        counter.add(count, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_nodes_streamed(_count: u64) {}

#[cfg(feature = "metrics")]
pub fn increment_edges_streamed(count: u64) {
    if let Some(counter) = EDGES_STREAMED.get() {
        counter.add(count, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_edges_streamed(_count: u64) {}

#[cfg(feature = "metrics")]
pub fn increment_workers_registered() {
    if let Some(counter) = WORKERS_REGISTERED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_workers_registered() {}
