//! Download engine for multi-part archives: bounded-concurrency
//! admission, resumable range-based transfers with cooperative
//! pause/cancel, byte-weighted overall progress, and a one-shot
//! extraction trigger once every part settles.

pub mod application;
pub mod config;
pub mod domain;
pub mod net;
pub mod utils;

pub use application::{
    CommandExtractor, DownloadCoordinator, ExtractionReport, Extractor, Notice, OverallProgress,
};
pub use config::EngineConfig;
pub use domain::{DownloadItem, DownloadStatus, ExtractionError, TransferError, TEMP_SUFFIX};
pub use net::{HttpClient, HttpError};
