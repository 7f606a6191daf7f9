pub mod apply;
pub mod context;
pub mod error;
pub mod metrics;
pub mod reconcile;
pub mod telemetry;

pub use context::ClusterContext;
pub use error::{Error, Result};
pub use metrics::ControllerMetrics;
pub use reconcile::{ReconcileReport, reconcile};
