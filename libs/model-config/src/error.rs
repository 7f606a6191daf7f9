use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config field {field}: {message}")]
    ConfigInvalid { field: String, message: String },

    #[error("failed to parse configuration document: {0}")]
    Parse(#[source] serde_yaml::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
