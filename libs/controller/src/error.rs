use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration field {field}: {message}")]
    ConfigInvalid { field: String, message: String },

    #[error("no model file could be resolved for group {group}")]
    NoModelResolvable { group: String },

    #[error("group {group} has more than one candidate model file: {candidates:?}")]
    AmbiguousArtifact { group: String, candidates: Vec<String> },

    #[error("digest mismatch staging {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("model store unavailable: {0}")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("kubernetes API unavailable: {0}")]
    ApiUnavailable(#[source] Box<kube::Error>),

    #[error("conflicting update for {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Drives orphan cleanup internally; never constructed outside this crate.
    #[error("{0} is orphaned")]
    Orphaned(String),

    #[error("failed to initialize telemetry: {0}")]
    TelemetryInit(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<fleetop_model_store::Error> for Error {
    fn from(e: fleetop_model_store::Error) -> Self {
        match e {
            fleetop_model_store::Error::DigestMismatch {
                path,
                expected,
                actual,
            } => Error::DigestMismatch {
                path,
                expected,
                actual,
            },
            other => Error::StoreUnavailable(Box::new(other)),
        }
    }
}

impl From<fleetop_model_stager::Error> for Error {
    fn from(e: fleetop_model_stager::Error) -> Self {
        match e {
            fleetop_model_stager::Error::NoModelResolvable { group } => {
                Error::NoModelResolvable { group }
            }
            fleetop_model_stager::Error::Store(inner) => Error::from(inner),
            other => Error::StoreUnavailable(Box::new(other)),
        }
    }
}

impl From<fleetop_runtime_planner::Error> for Error {
    fn from(e: fleetop_runtime_planner::Error) -> Self {
        match e {
            fleetop_runtime_planner::Error::NoModelResolvable { group } => {
                Error::NoModelResolvable { group }
            }
            fleetop_runtime_planner::Error::AmbiguousArtifact { group, candidates } => {
                Error::AmbiguousArtifact { group, candidates }
            }
        }
    }
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        Error::ApiUnavailable(Box::new(e))
    }
}
