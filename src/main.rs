use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use easyparts::utils::human_bytes;
use easyparts::{DownloadCoordinator, DownloadStatus, EngineConfig, ExtractionReport, Notice};

#[derive(Parser)]
#[command(
    name = "easyparts",
    version,
    about = "Parallel downloader for multi-part archives with pause/resume and auto-extract"
)]
struct Cli {
    /// Part URLs to download
    urls: Vec<String>,

    /// Read additional URLs from a file, one per line
    #[arg(long, value_name = "FILE")]
    list: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "downloads")]
    dest: PathBuf,

    /// Maximum simultaneous downloads
    #[arg(short, long, default_value_t = 3)]
    parallel: usize,

    /// Extract the archive once all parts finish
    #[arg(long)]
    extract: bool,

    /// Delete part files after a successful extraction
    #[arg(long)]
    cleanup: bool,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Emit machine-readable JSON events instead of human output
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let mut urls = cli.urls.clone();
    if let Some(list) = &cli.list {
        match std::fs::read_to_string(list) {
            Ok(text) => urls.extend(
                text.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(str::to_owned),
            ),
            Err(e) => {
                eprintln!("error: cannot read {}: {e}", list.display());
                return ExitCode::FAILURE;
            }
        }
    }
    if urls.is_empty() {
        eprintln!("error: no URLs given (pass URLs or --list FILE)");
        return ExitCode::FAILURE;
    }

    let config = EngineConfig {
        dest_dir: cli.dest,
        concurrency: cli.parallel.max(1),
        auto_extract: cli.extract,
        cleanup_after_extract: cli.cleanup,
        timeout_secs: cli.timeout,
        ..EngineConfig::default()
    };

    let mut coordinator = match DownloadCoordinator::new(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    for url in &urls {
        coordinator.add_url(url);
    }

    while let Some(notice) = coordinator.next_event().await {
        if cli.json {
            if let Ok(line) = serde_json::to_string(&notice) {
                println!("{line}");
            }
        } else {
            render(&notice);
        }
        if matches!(notice, Notice::BatchFinished { .. }) {
            break;
        }
    }

    let failed = coordinator
        .items()
        .iter()
        .filter(|it| it.status == DownloadStatus::Error)
        .count();
    if failed > 0 {
        eprintln!("{failed} download(s) failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn render(notice: &Notice) {
    match notice {
        Notice::Progress {
            index,
            downloaded,
            total,
            overall,
        } => {
            print!(
                "\r#{} {} / {}   overall {:5.1}% ({}/{} done)",
                index + 1,
                human_bytes(Some(*downloaded)),
                human_bytes(*total),
                overall.fraction * 100.0,
                overall.done,
                overall.total,
            );
            std::io::stdout().flush().ok();
        }
        Notice::StatusChanged { index, status } => {
            println!("\n#{}: {status}", index + 1);
        }
        Notice::Completed { index, path } => {
            println!("\n#{}: done -> {}", index + 1, path.display());
        }
        Notice::Failed { index, message } => {
            println!("\n#{}: failed: {message}", index + 1);
        }
        Notice::BatchFinished { extraction } => {
            println!("\nall transfers settled");
            match extraction {
                Some(ExtractionReport::Extracted { archive }) => {
                    println!("extracted {}", archive.display());
                }
                Some(ExtractionReport::NoArchive) => {
                    println!("no archive found to extract");
                }
                Some(ExtractionReport::Failed { message }) => {
                    println!("extraction failed: {message}");
                }
                None => {}
            }
        }
    }
}
