pub mod download_coordinator;
pub mod extraction;
pub mod progress;
mod worker;

pub use download_coordinator::{DownloadCoordinator, ExtractionReport, Notice};
pub use extraction::{CommandExtractor, Extractor};
pub use progress::{overall_progress, OverallProgress};
