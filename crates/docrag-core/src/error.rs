use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Provider request failed: {0}")]
    Provider(String),

    #[error("Malformed provider response: {0}")]
    Decode(String),

    #[error("Provider returned status {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    #[error("Corpus was chunked as {stored}, refusing to mix in {requested}")]
    CorpusMismatch { stored: String, requested: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Transport failures, throttling and server-side errors are worth another attempt.
    /// A response that arrived but could not be used is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(_) => true,
            Self::ProviderStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
