use serde::Serialize;

use crate::domain::{DownloadItem, DownloadStatus};

/// Snapshot of overall batch progress, recomputed from the item
/// collection on every event. No cached incremental state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverallProgress {
    /// Fraction in `[0, 1]`. Byte-weighted when any size is known,
    /// done-item fraction otherwise.
    pub fraction: f64,
    pub done: usize,
    pub total: usize,
}

pub fn overall_progress(items: &[DownloadItem]) -> OverallProgress {
    let done = items
        .iter()
        .filter(|it| it.status == DownloadStatus::Done)
        .count();
    let total = items.len();

    let known_total: u64 = items.iter().filter_map(|it| it.size).sum();
    let fraction = if known_total > 0 {
        let transferred: u64 = items
            .iter()
            .map(|it| it.downloaded.min(it.size.unwrap_or(it.downloaded)))
            .sum();
        // Items with an unknown size count toward the numerator only, so
        // the quotient itself can overshoot.
        (transferred as f64 / known_total as f64).min(1.0)
    } else if total > 0 {
        done as f64 / total as f64
    } else {
        0.0
    };

    OverallProgress {
        fraction,
        done,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn item(id: u64, size: Option<u64>, downloaded: u64, status: DownloadStatus) -> DownloadItem {
        let mut it = DownloadItem::new(
            id,
            id as usize,
            format!("https://example.com/{id}.bin"),
            PathBuf::from("/tmp"),
        );
        it.size = size;
        it.downloaded = downloaded;
        it.status = status;
        it
    }

    #[test]
    fn test_byte_weighted_fraction() {
        let items = vec![
            item(0, Some(100), 50, DownloadStatus::Downloading),
            item(1, Some(100), 100, DownloadStatus::Done),
        ];
        let overall = overall_progress(&items);
        assert_eq!(overall.fraction, 0.75);
        assert_eq!(overall.done, 1);
        assert_eq!(overall.total, 2);
    }

    #[test]
    fn test_unknown_sizes_fall_back_to_item_count() {
        let items = vec![
            item(0, None, 10, DownloadStatus::Done),
            item(1, None, 5, DownloadStatus::Downloading),
            item(2, None, 0, DownloadStatus::Queued),
        ];
        let overall = overall_progress(&items);
        assert!((overall.fraction - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_overshoot_is_clamped() {
        // A server that streams more than the probe claimed must not push
        // the fraction past 1.
        let items = vec![item(0, Some(100), 120, DownloadStatus::Downloading)];
        assert_eq!(overall_progress(&items).fraction, 1.0);

        // Same when an unknown-size item's bytes have nothing to weigh
        // against in the denominator.
        let mixed = vec![
            item(0, Some(100), 100, DownloadStatus::Done),
            item(1, None, 500, DownloadStatus::Downloading),
        ];
        assert_eq!(overall_progress(&mixed).fraction, 1.0);
    }

    #[test]
    fn test_empty_collection() {
        let overall = overall_progress(&[]);
        assert_eq!(overall.fraction, 0.0);
        assert_eq!(overall.total, 0);
    }
}
