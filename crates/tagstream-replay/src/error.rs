use std::path::PathBuf;

use tagstream_core::{ConfigError, ParseError};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Write(#[from] std::io::Error),
    #[error("event printer thread panicked")]
    PrinterPanicked,
}
