use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{operation} is not allowed while the generator is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Unknown hash method: {0}")]
    UnknownMethod(String),

    #[error("KDF error: {0}")]
    Kdf(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Word list error: {0}")]
    Wordlist(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
