pub mod error;
pub mod model;

pub use error::{ExtractionError, TransferError};
pub use model::{DownloadItem, DownloadStatus, TEMP_SUFFIX};
