use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no model resolvable for group {group}")]
    NoModelResolvable { group: String },

    #[error("ambiguous artifact for group {group}: candidates {candidates:?}")]
    AmbiguousArtifact {
        group: String,
        candidates: Vec<String>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
