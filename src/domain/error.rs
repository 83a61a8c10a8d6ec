use std::path::PathBuf;

use thiserror::Error;

use crate::net::HttpError;

/// Failure of a single transfer attempt. Recorded as text on the item;
/// never aborts sibling transfers.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no archive found in {}", .0.display())]
    NoArchive(PathBuf),

    #[error("failed to launch extractor: {0}")]
    Spawn(String),

    #[error("extractor failed: {0}")]
    Failed(String),
}
