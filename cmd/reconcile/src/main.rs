use fleetop_controller::telemetry::LogFormat;
use fleetop_controller::{ClusterContext, ControllerMetrics, reconcile, telemetry};
use fleetop_k8s_util::client::new_client_with_metrics;
use fleetop_model_config::{ClusterConfig, validate::validate_cluster_config};
use fleetop_model_store::S3ModelStore;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use clap::{Parser, crate_authors, crate_description, crate_version};
use kube::Config;
use prometheus_client::registry::Registry;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(
    name = "fleetop-reconcile",
    about = crate_description!(),
    version = crate_version!(),
    author = crate_authors!("\n"),
)]
struct Args {
    /// Path to the cluster config document (YAML).
    #[arg(short, long, env)]
    config: PathBuf,

    /// Namespace model-group objects are reconciled in.
    #[arg(short, long, env)]
    namespace: Option<String>,

    /// Listen on given port for `/metrics` and `/health`, then exit without reconciling.
    ///
    /// When unset, runs a single reconcile pass and exits; no HTTP server is started. Set this
    /// to run as a long-lived sidecar a scheduler invokes out-of-band, exposing the result of
    /// the last pass.
    #[arg(short, long, env)]
    port: Option<u16>,

    /// Set logging filter directive for `tracing_subscriber::filter::EnvFilter`.
    #[arg(long, default_value = "info", env)]
    log_filter: String,

    /// Log output format.
    #[arg(long, value_enum, default_value = "json", env)]
    log_format: LogFormat,

    /// OTLP collector endpoint for trace export. When unset, spans are only recorded locally
    /// by the fmt layer.
    #[arg(long, env)]
    tracing_url: Option<String>,

    /// Fraction of traces sampled when `--tracing-url` is set.
    #[arg(long, default_value_t = 1.0, env)]
    trace_sample_ratio: f64,
}

#[derive(Clone)]
struct AppState {
    metrics: Arc<ControllerMetrics>,
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                "content-type",
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {e:?}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health() -> impl IntoResponse {
    Json("healthy")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    telemetry::init(
        &args.log_filter,
        args.log_format,
        args.tracing_url.as_deref(),
        args.trace_sample_ratio,
    )
    .await?;

    let config_bytes = tokio::fs::read(&args.config).await?;
    let config: ClusterConfig = serde_yaml::from_slice(&config_bytes)?;
    if let Err(e) = validate_cluster_config(&config) {
        tracing::error!(error = %e, "configuration is invalid");
        std::process::exit(1);
    }
    let namespace = args.namespace.unwrap_or_else(|| config.namespace.clone());

    let mut client_metrics_registry = Registry::default();
    let kube_config = Config::infer().await?;
    let client = new_client_with_metrics(kube_config, &mut client_metrics_registry).await?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let s3_client = aws_sdk_s3::Client::new(&aws_config);
    let store = S3ModelStore::new(s3_client, config.bucket_name.clone());

    let metrics = Arc::new(ControllerMetrics::new());
    let ctx = ClusterContext::new(
        namespace,
        config.bucket_name.clone(),
        client,
        store,
        metrics.clone(),
    );

    let report = reconcile(&ctx, &config).await;
    for name in &report.succeeded {
        tracing::info!(group = name, "reconciled");
    }
    for (name, err) in &report.failed {
        tracing::error!(group = name, error = %err, "failed to reconcile");
    }
    tracing::info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        orphans_deleted = report.orphans_deleted,
        "reconcile pass complete"
    );

    if let Some(port) = args.port {
        let state = AppState { metrics };
        let app = Router::new()
            .route("/metrics", get(metrics))
            .route("/health", get(health))
            .with_state(state);
        let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        axum::serve(listener, app).await?;
    }

    if !report.is_success() {
        std::process::exit(exit_code_for(&report));
    }
    Ok(())
}

/// Maps the aggregate outcome of a reconcile pass to a process exit code, per the operator-facing
/// taxonomy: `1` if every failure was a validation/resolution error the operator must fix in the
/// declaration (`ConfigInvalid`, `NoModelResolvable`, `AmbiguousArtifact`, `DigestMismatch`), `2`
/// if any failure came from an external system (`StoreUnavailable`, `ApiUnavailable`, `Conflict`).
fn exit_code_for(report: &fleetop_controller::ReconcileReport) -> i32 {
    use fleetop_controller::Error;

    let any_external = report.failed.iter().any(|(_, e)| {
        matches!(
            e,
            Error::StoreUnavailable(_) | Error::ApiUnavailable(_) | Error::Conflict(_)
        )
    });
    if any_external { 2 } else { 1 }
}
