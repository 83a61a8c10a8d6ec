use std::path::PathBuf;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::domain::TransferError;
use crate::net::HttpClient;

/// Progress events are throttled to this cadence; the final byte count is
/// always emitted regardless.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(50);

/// Out-of-band control signal for a worker. A worker observes it between
/// chunks only, so a single chunk write is never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerCommand {
    Run,
    Pause,
    Cancel,
}

/// Event reported by a worker to the coordinator, keyed by item id.
#[derive(Debug)]
pub(crate) struct WorkerEvent {
    pub id: u64,
    pub kind: WorkerEventKind,
}

#[derive(Debug)]
pub(crate) enum WorkerEventKind {
    Progress { downloaded: u64, total: Option<u64> },
    Paused,
    Canceled,
    Done { path: PathBuf },
    Failed { message: String },
}

enum Outcome {
    Done { path: PathBuf },
    Canceled,
}

enum Pulse {
    Continue,
    Stop,
}

/// Drives one item through the network: resume-aware fetch, chunked
/// writing to the `.part` temp file, cooperative pause/cancel, and an
/// atomic rename on success.
///
/// Workers never touch coordinator state; everything they learn goes out
/// through the event channel.
pub(crate) struct DownloadWorker {
    id: u64,
    url: String,
    dest_dir: PathBuf,
    final_path: PathBuf,
    temp_path: PathBuf,
    client: HttpClient,
    control: watch::Receiver<WorkerCommand>,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl DownloadWorker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u64,
        url: String,
        dest_dir: PathBuf,
        final_path: PathBuf,
        temp_path: PathBuf,
        client: HttpClient,
        control: watch::Receiver<WorkerCommand>,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            id,
            url,
            dest_dir,
            final_path,
            temp_path,
            client,
            control,
            events,
        }
    }

    /// One transfer attempt. Terminal for this attempt; the coordinator
    /// may re-admit the item later, which restarts from the temp file.
    pub(crate) async fn run(mut self) {
        debug!(id = self.id, url = %self.url, "transfer attempt starting");
        match self.transfer().await {
            Ok(Outcome::Done { path }) => {
                info!(id = self.id, path = %path.display(), "transfer complete");
                self.emit(WorkerEventKind::Done { path });
            }
            Ok(Outcome::Canceled) => {
                info!(id = self.id, "transfer canceled; partial file kept");
                self.emit(WorkerEventKind::Canceled);
            }
            Err(e) => {
                warn!(id = self.id, error = %e, "transfer failed");
                self.emit(WorkerEventKind::Failed {
                    message: e.to_string(),
                });
            }
        }
    }

    async fn transfer(&mut self) -> Result<Outcome, TransferError> {
        fs::create_dir_all(&self.dest_dir).await?;

        // A leftover temp file is the resume point. A pre-existing final
        // file means an earlier run already finished: no network needed.
        let mut resume_from = 0u64;
        match fs::metadata(&self.temp_path).await {
            Ok(meta) => resume_from = meta.len(),
            Err(_) => {
                if let Ok(meta) = fs::metadata(&self.final_path).await {
                    let len = meta.len();
                    self.emit_progress(len, Some(len));
                    return Ok(Outcome::Done {
                        path: self.final_path.clone(),
                    });
                }
            }
        }

        let mut total = match self.client.probe(&self.url).await {
            Ok(probe) => {
                debug!(
                    id = self.id,
                    size = ?probe.size,
                    accept_ranges = probe.accept_ranges,
                    "probe ok"
                );
                probe.size
            }
            Err(e) => {
                // Many servers reject HEAD yet honor ranged GETs.
                warn!(id = self.id, error = %e, "probe failed, proceeding optimistically");
                None
            }
        };

        let mut fetch = self.client.fetch(&self.url, resume_from).await?;
        if resume_from > 0 && !fetch.resumed {
            warn!(id = self.id, "server ignored range request, restarting from zero");
            resume_from = 0;
        }
        if total.is_none() {
            total = fetch.content_length.map(|len| len + resume_from);
        }

        let mut file = if resume_from > 0 {
            OpenOptions::new().append(true).open(&self.temp_path).await?
        } else {
            File::create(&self.temp_path).await?
        };

        let mut downloaded = resume_from;
        self.emit_progress(downloaded, total);
        let mut last_emit = Instant::now();

        while let Some(chunk) = fetch.stream.next().await {
            let chunk = chunk.map_err(TransferError::Http)?;
            match self.obey_control().await {
                Pulse::Continue => {}
                Pulse::Stop => return Ok(Outcome::Canceled),
            }
            if chunk.is_empty() {
                continue;
            }
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if last_emit.elapsed() >= PROGRESS_INTERVAL {
                self.emit_progress(downloaded, total);
                last_emit = Instant::now();
            }
        }

        file.sync_all().await?;
        drop(file);
        fs::rename(&self.temp_path, &self.final_path).await?;

        // The streamed count is authoritative when the probe disagreed.
        self.emit_progress(downloaded, Some(downloaded));
        Ok(Outcome::Done {
            path: self.final_path.clone(),
        })
    }

    /// Observe the control signal between chunks. Parks without busy
    /// waiting while paused; wakes on resume or cancel.
    async fn obey_control(&mut self) -> Pulse {
        let mut parked = false;
        loop {
            let command = *self.control.borrow_and_update();
            match command {
                WorkerCommand::Run => return Pulse::Continue,
                WorkerCommand::Cancel => return Pulse::Stop,
                WorkerCommand::Pause => {
                    if !parked {
                        parked = true;
                        self.emit(WorkerEventKind::Paused);
                    }
                    if self.control.changed().await.is_err() {
                        // Coordinator is gone; stop like a cancel.
                        return Pulse::Stop;
                    }
                }
            }
        }
    }

    fn emit_progress(&self, downloaded: u64, total: Option<u64>) {
        self.emit(WorkerEventKind::Progress { downloaded, total });
    }

    fn emit(&self, kind: WorkerEventKind) {
        let _ = self.events.send(WorkerEvent { id: self.id, kind });
    }
}
