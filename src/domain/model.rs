use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::utils::infer_filename_from_url;

/// Suffix appended to the final path while a transfer is in flight.
/// The temp file is renamed onto the final path only on full success.
pub const TEMP_SUFFIX: &str = ".part";

/// Lifecycle status of one download item.
///
/// `Done`, `Error` and `Canceled` are terminal: nothing moves an item out
/// of them except an explicit re-admission, which resets to `Queued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStatus {
    Queued,
    Downloading,
    Paused,
    Done,
    Error,
    Canceled,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Canceled)
    }

    /// Closed transition table. Self-transitions are always allowed
    /// (worker status echoes); anything else not listed here is rejected
    /// by the coordinator.
    pub fn can_become(self, next: DownloadStatus) -> bool {
        use DownloadStatus::*;
        if self == next {
            return true;
        }
        match (self, next) {
            (Queued, Downloading | Paused | Canceled) => true,
            (Downloading, Paused | Done | Error | Canceled) => true,
            (Paused, Queued | Canceled) => true,
            (Done | Error | Canceled, Queued) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "Queued",
            Self::Downloading => "Downloading",
            Self::Paused => "Paused",
            Self::Done => "Done",
            Self::Error => "Error",
            Self::Canceled => "Canceled",
        };
        f.write_str(s)
    }
}

/// One remote file to fetch: source, destination, observed size and
/// progress, lifecycle status.
///
/// The display `index` is the public addressing key and is reassigned on
/// removal/compaction; `id` is stable for the item's lifetime and keys
/// worker events so a reindex can never misroute one.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadItem {
    pub(crate) id: u64,
    pub index: usize,
    pub url: String,
    pub dest_dir: PathBuf,
    filename: Option<String>,
    pub size: Option<u64>,
    pub downloaded: u64,
    pub status: DownloadStatus,
    pub error: Option<String>,
}

impl DownloadItem {
    pub(crate) fn new(id: u64, index: usize, url: String, dest_dir: PathBuf) -> Self {
        Self {
            id,
            index,
            url,
            dest_dir,
            filename: None,
            size: None,
            downloaded: 0,
            status: DownloadStatus::Queued,
            error: None,
        }
    }

    /// Resolved filename, derived from the URL path on first call and
    /// cached.
    pub fn filename(&mut self) -> &str {
        if self.filename.is_none() {
            self.filename = Some(infer_filename_from_url(&self.url));
        }
        self.filename.as_deref().unwrap_or_default()
    }

    /// The cached filename, if [`Self::filename`] has run.
    pub fn resolved_filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn final_path(&mut self) -> PathBuf {
        let name = self.filename().to_owned();
        self.dest_dir.join(name)
    }

    pub fn temp_path(&mut self) -> PathBuf {
        let mut path = self.final_path().into_os_string();
        path.push(TEMP_SUFFIX);
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let mut item = DownloadItem::new(
            1,
            0,
            "https://example.com/dl/game.part1.rar".into(),
            PathBuf::from("/downloads"),
        );
        assert_eq!(item.final_path(), PathBuf::from("/downloads/game.part1.rar"));
        assert_eq!(
            item.temp_path(),
            PathBuf::from("/downloads/game.part1.rar.part")
        );
        // Memoized after first derivation.
        assert_eq!(item.resolved_filename(), Some("game.part1.rar"));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(DownloadStatus::Done.is_terminal());
        assert!(DownloadStatus::Error.is_terminal());
        assert!(DownloadStatus::Canceled.is_terminal());
        assert!(!DownloadStatus::Queued.is_terminal());
        assert!(!DownloadStatus::Downloading.is_terminal());
        assert!(!DownloadStatus::Paused.is_terminal());
    }

    #[test]
    fn test_transition_table() {
        use DownloadStatus::*;
        assert!(Queued.can_become(Downloading));
        assert!(Downloading.can_become(Paused));
        assert!(Downloading.can_become(Done));
        assert!(Paused.can_become(Queued));
        assert!(Canceled.can_become(Queued));
        // Terminal states never jump straight back to Downloading.
        assert!(!Done.can_become(Downloading));
        assert!(!Error.can_become(Downloading));
        assert!(!Canceled.can_become(Downloading));
        // Echo of the current status is fine.
        assert!(Paused.can_become(Paused));
    }
}
