//! End-to-end batch behavior: bounded admission, restart-resumed parts,
//! and the extraction hand-off.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use easyparts::{
    DownloadCoordinator, DownloadStatus, EngineConfig, ExtractionError, ExtractionReport,
    Extractor, Notice,
};

struct RecorderExtractor {
    calls: Mutex<Vec<PathBuf>>,
}

impl RecorderExtractor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

impl Extractor for RecorderExtractor {
    fn extract(&self, archive: &Path, _out_dir: &Path) -> Result<(), ExtractionError> {
        self.calls.lock().unwrap().push(archive.to_path_buf());
        Ok(())
    }
}

fn config(dir: &TempDir, concurrency: usize, auto_extract: bool) -> EngineConfig {
    EngineConfig {
        dest_dir: dir.path().to_path_buf(),
        concurrency,
        auto_extract,
        cleanup_after_extract: false,
        timeout_secs: 5,
        ..EngineConfig::default()
    }
}

async fn drive_to_batch(coordinator: &mut DownloadCoordinator, ceiling: usize) -> Option<Notice> {
    loop {
        let notice = timeout(Duration::from_secs(10), coordinator.next_event())
            .await
            .expect("coordinator stalled")?;
        // The concurrency ceiling holds after every applied event.
        let downloading = coordinator
            .items()
            .iter()
            .filter(|it| it.status == DownloadStatus::Downloading)
            .count();
        assert!(downloading <= ceiling, "ceiling exceeded: {downloading}");
        if matches!(notice, Notice::BatchFinished { .. }) {
            return Some(notice);
        }
    }
}

#[tokio::test]
async fn multi_part_batch_with_restart_resume_and_extraction() {
    let mut server = mockito::Server::new_async().await;
    let _m1 = server
        .mock("GET", "/game.part1.rar")
        .with_body("PART1-DATA")
        .create_async()
        .await;
    // Part 2 was half-fetched in a previous run; only the tail is served,
    // and only to a correctly ranged request.
    let _m2 = server
        .mock("GET", "/game.part2.rar")
        .match_header("range", "bytes=6-")
        .with_status(206)
        .with_body("DATA")
        .create_async()
        .await;
    let _m3 = server
        .mock("GET", "/game.part3.rar")
        .with_body("PART3-DATA")
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("game.part2.rar.part"), "PART2-").unwrap();

    let recorder = RecorderExtractor::new();
    let mut coordinator =
        DownloadCoordinator::with_extractor(config(&dir, 2, true), recorder.clone()).unwrap();
    for part in 1..=3 {
        coordinator.add_url(&format!("{}/game.part{part}.rar", server.url()));
    }
    // Two slots, three parts: the third waits.
    assert_eq!(coordinator.items()[2].status, DownloadStatus::Queued);

    let batch = drive_to_batch(&mut coordinator, 2).await.unwrap();

    for (part, expected) in [(1, "PART1-DATA"), (2, "PART2-DATA"), (3, "PART3-DATA")] {
        let path = dir.path().join(format!("game.part{part}.rar"));
        assert_eq!(std::fs::read(&path).unwrap(), expected.as_bytes());
        assert!(!dir
            .path()
            .join(format!("game.part{part}.rar.part"))
            .exists());
    }
    assert!(coordinator
        .items()
        .iter()
        .all(|it| it.status == DownloadStatus::Done));
    assert_eq!(coordinator.overall().fraction, 1.0);

    // Extraction ran once, against the lexicographically first part.
    assert_eq!(recorder.calls(), [dir.path().join("game.part1.rar")]);
    assert!(matches!(
        batch,
        Notice::BatchFinished {
            extraction: Some(ExtractionReport::Extracted { .. })
        }
    ));
}

#[tokio::test]
async fn resumed_download_matches_single_pass_download() {
    let payload = "0123456789abcdefghij";
    let split = 12;

    let mut server = mockito::Server::new_async().await;
    let _fresh = server
        .mock("GET", "/fresh/file.bin")
        .with_body(payload)
        .create_async()
        .await;
    let _tail = server
        .mock("GET", "/resumed/file.bin")
        .match_header("range", format!("bytes={split}-").as_str())
        .with_status(206)
        .with_body(&payload[split..])
        .create_async()
        .await;

    // One pass, no interruption.
    let fresh_dir = TempDir::new().unwrap();
    let mut coordinator =
        DownloadCoordinator::with_extractor(config(&fresh_dir, 1, false), RecorderExtractor::new())
            .unwrap();
    coordinator.add_url(&format!("{}/fresh/file.bin", server.url()));
    drive_to_batch(&mut coordinator, 1).await.unwrap();

    // Interrupted earlier: the temp file holds the first `split` bytes.
    let resumed_dir = TempDir::new().unwrap();
    std::fs::write(resumed_dir.path().join("file.bin.part"), &payload[..split]).unwrap();
    let mut coordinator = DownloadCoordinator::with_extractor(
        config(&resumed_dir, 1, false),
        RecorderExtractor::new(),
    )
    .unwrap();
    coordinator.add_url(&format!("{}/resumed/file.bin", server.url()));
    drive_to_batch(&mut coordinator, 1).await.unwrap();

    let fresh = std::fs::read(fresh_dir.path().join("file.bin")).unwrap();
    let resumed = std::fs::read(resumed_dir.path().join("file.bin")).unwrap();
    assert_eq!(fresh, resumed);
    assert_eq!(fresh, payload.as_bytes());
}

#[tokio::test]
async fn disabled_extraction_still_reports_batch_completion() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/game.part1.rar")
        .with_body("data")
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let recorder = RecorderExtractor::new();
    let mut coordinator =
        DownloadCoordinator::with_extractor(config(&dir, 1, false), recorder.clone()).unwrap();
    coordinator.add_url(&format!("{}/game.part1.rar", server.url()));

    let batch = drive_to_batch(&mut coordinator, 1).await.unwrap();
    assert!(matches!(batch, Notice::BatchFinished { extraction: None }));
    assert!(recorder.calls().is_empty());
}
