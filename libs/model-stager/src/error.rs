use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no model resolvable for group {group}")]
    NoModelResolvable { group: String },

    #[error(transparent)]
    Store(#[from] fleetop_model_store::Error),

    #[error("http request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to (de)serialize manifest: {0}")]
    Manifest(#[source] serde_yaml::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
