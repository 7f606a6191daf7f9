use crate::error::{Error, Result};

use std::time::Duration;

use clap::ValueEnum;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Initialize the global `tracing` subscriber: an `EnvFilter`-gated fmt layer in the requested
/// format, plus an optional OTLP tracing layer when `tracing_url` is given.
pub async fn init(
    log_filter: &str,
    log_format: LogFormat,
    tracing_url: Option<&str>,
    sample_ratio: f64,
) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer: Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync> = match log_format {
        LogFormat::Text => Box::new(tracing_subscriber::fmt::layer()),
        LogFormat::Json => Box::new(tracing_subscriber::fmt::layer().json()),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    match tracing_url {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .with_timeout(Duration::from_secs(3))
                .build()
                .map_err(|e| Error::TelemetryInit(Box::new(e)))?;

            let sampler = opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(sample_ratio);
            let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                .with_sampler(sampler)
                .with_batch_exporter(exporter)
                .build();
            let tracer = provider.tracer("fleetop-reconcile");
            opentelemetry::global::set_tracer_provider(provider);

            registry
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()
                .map_err(|e| Error::TelemetryInit(Box::new(e)))?;
        }
        None => {
            registry
                .try_init()
                .map_err(|e| Error::TelemetryInit(Box::new(e)))?;
        }
    }

    Ok(())
}
