use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::application::extraction::{self, CommandExtractor, Extractor};
use crate::application::progress::{overall_progress, OverallProgress};
use crate::application::worker::{DownloadWorker, WorkerCommand, WorkerEvent, WorkerEventKind};
use crate::config::EngineConfig;
use crate::domain::{DownloadItem, DownloadStatus};
use crate::net::{HttpClient, HttpError};

/// Notice surfaced to whatever drives the coordinator (CLI, UI, tests).
#[derive(Debug, Clone, Serialize)]
pub enum Notice {
    Progress {
        index: usize,
        downloaded: u64,
        total: Option<u64>,
        overall: OverallProgress,
    },
    StatusChanged {
        index: usize,
        status: DownloadStatus,
    },
    Completed {
        index: usize,
        path: PathBuf,
    },
    Failed {
        index: usize,
        message: String,
    },
    /// Every item reached a terminal status. Emitted once per batch.
    BatchFinished {
        extraction: Option<ExtractionReport>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub enum ExtractionReport {
    Extracted { archive: PathBuf },
    NoArchive,
    Failed { message: String },
}

/// Control handle for one item's worker. The handle persists across
/// pause/resume cycles; `live` tracks whether an attempt task exists.
struct WorkerHandle {
    control: watch::Sender<WorkerCommand>,
    live: bool,
}

/// Admission controller and sole mutator of item state.
///
/// Workers report through an mpsc channel; [`Self::next_event`] drains it
/// one event at a time, applies the mutation, re-pumps the queue, and
/// returns a [`Notice`]. All other methods are synchronous control
/// operations from the owning context, so item state never changes
/// concurrently with a read.
pub struct DownloadCoordinator {
    config: EngineConfig,
    client: HttpClient,
    extractor: Arc<dyn Extractor>,
    items: Vec<DownloadItem>,
    workers: HashMap<u64, WorkerHandle>,
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
    events_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    next_id: u64,
    batch_reported: bool,
}

impl DownloadCoordinator {
    pub fn new(config: EngineConfig) -> Result<Self, HttpError> {
        Self::with_extractor(config, Arc::new(CommandExtractor::default()))
    }

    pub fn with_extractor(
        config: EngineConfig,
        extractor: Arc<dyn Extractor>,
    ) -> Result<Self, HttpError> {
        let client = HttpClient::new(config.timeout(), &config.user_agent)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            client,
            extractor,
            items: Vec::new(),
            workers: HashMap::new(),
            events_tx,
            events_rx,
            next_id: 0,
            batch_reported: false,
        })
    }

    /// Queue a new URL and pump. Returns the item's display index.
    pub fn add_url(&mut self, url: &str) -> usize {
        let index = self.items.len();
        let id = self.next_id;
        self.next_id += 1;
        let mut item = DownloadItem::new(
            id,
            index,
            url.trim().to_string(),
            self.config.dest_dir.clone(),
        );
        item.filename();
        info!(index, url = %item.url, "item queued");
        self.items.push(item);
        self.batch_reported = false;
        self.pump();
        index
    }

    pub fn items(&self) -> &[DownloadItem] {
        &self.items
    }

    pub fn overall(&self) -> OverallProgress {
        overall_progress(&self.items)
    }

    /// True when the collection is non-empty and every item is terminal.
    pub fn all_terminal(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|it| it.status.is_terminal())
    }

    /// Pause the given items. Running workers park between chunks; queued
    /// items are withheld from admission until resumed.
    pub fn pause(&mut self, indices: &[usize]) {
        for &i in indices {
            let Some(item) = self.items.get_mut(i) else {
                continue;
            };
            if !item.status.can_become(DownloadStatus::Paused) {
                continue;
            }
            if let Some(handle) = self.workers.get(&item.id) {
                let _ = handle.control.send_replace(WorkerCommand::Pause);
            }
            item.status = DownloadStatus::Paused;
            debug!(index = i, "paused");
        }
    }

    /// Re-admit the given items: paused, errored and canceled items reset
    /// to `Queued`, then the queue pumps to claim free slots.
    pub fn resume(&mut self, indices: &[usize]) {
        for &i in indices {
            let Some(item) = self.items.get_mut(i) else {
                continue;
            };
            if matches!(
                item.status,
                DownloadStatus::Paused | DownloadStatus::Error | DownloadStatus::Canceled
            ) {
                item.status = DownloadStatus::Queued;
                item.error = None;
                self.batch_reported = false;
                debug!(index = i, "re-queued");
            }
        }
        self.pump();
    }

    /// Cancel the given items. The partial file is left on disk as a
    /// resume point.
    pub fn cancel(&mut self, indices: &[usize]) {
        for &i in indices {
            let Some(item) = self.items.get_mut(i) else {
                continue;
            };
            if !item.status.can_become(DownloadStatus::Canceled) {
                continue;
            }
            if let Some(handle) = self.workers.get(&item.id) {
                let _ = handle.control.send_replace(WorkerCommand::Cancel);
            }
            item.status = DownloadStatus::Canceled;
            debug!(index = i, "canceled");
        }
        self.pump();
    }

    /// Drop the given items entirely, canceling any running worker, and
    /// reindex the remainder.
    pub fn remove(&mut self, indices: &[usize]) {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        for &i in sorted.iter().rev() {
            if i >= self.items.len() {
                continue;
            }
            let item = self.items.remove(i);
            if let Some(handle) = self.workers.remove(&item.id) {
                let _ = handle.control.send_replace(WorkerCommand::Cancel);
            }
        }
        self.reindex();
        self.pump();
    }

    /// Drop all terminal items, keeping their files on disk.
    pub fn clear_finished(&mut self) {
        let dropped: Vec<u64> = self
            .items
            .iter()
            .filter(|it| it.status.is_terminal())
            .map(|it| it.id)
            .collect();
        self.items.retain(|it| !it.status.is_terminal());
        for id in dropped {
            self.workers.remove(&id);
        }
        self.reindex();
    }

    /// Adjust the concurrency ceiling (clamped to at least 1) and pump to
    /// fill any newly available slots.
    pub fn set_concurrency(&mut self, n: usize) {
        self.config.concurrency = n.max(1);
        self.pump();
    }

    /// Receive and apply the next worker event, returning a notice for
    /// the caller. Emits [`Notice::BatchFinished`] exactly once per batch
    /// after which the caller should stop driving until it mutates the
    /// collection again.
    pub async fn next_event(&mut self) -> Option<Notice> {
        loop {
            if self.batch_ready() {
                let extraction = self.run_extraction().await;
                self.batch_reported = true;
                return Some(Notice::BatchFinished { extraction });
            }
            let ev = self.events_rx.recv().await?;
            if let Some(notice) = self.apply(ev) {
                return Some(notice);
            }
        }
    }

    /// One pump cycle: fill free admission slots with queued items in
    /// display order. Idempotent; the only scheduling trigger.
    fn pump(&mut self) {
        let ceiling = self.config.concurrency.max(1);
        let running = self
            .items
            .iter()
            .filter(|it| it.status == DownloadStatus::Downloading)
            .count();
        let mut slots = ceiling.saturating_sub(running);
        for i in 0..self.items.len() {
            if slots == 0 {
                break;
            }
            if self.items[i].status != DownloadStatus::Queued {
                continue;
            }
            self.admit(i);
            slots -= 1;
        }
    }

    /// Promote one queued item to `Downloading`, reusing its parked
    /// worker when one is alive or spawning a fresh attempt.
    fn admit(&mut self, i: usize) {
        let id = self.items[i].id;
        let url = self.items[i].url.clone();
        let dest_dir = self.items[i].dest_dir.clone();
        let final_path = self.items[i].final_path();
        let temp_path = self.items[i].temp_path();

        let handle = self.workers.entry(id).or_insert_with(|| WorkerHandle {
            control: watch::channel(WorkerCommand::Run).0,
            live: false,
        });
        let _ = handle.control.send_replace(WorkerCommand::Run);
        if !handle.live {
            let worker = DownloadWorker::new(
                id,
                url,
                dest_dir,
                final_path,
                temp_path,
                self.client.clone(),
                handle.control.subscribe(),
                self.events_tx.clone(),
            );
            tokio::spawn(worker.run());
            handle.live = true;
        }

        let item = &mut self.items[i];
        item.status = DownloadStatus::Downloading;
        item.error = None;
        debug!(index = i, url = %item.url, "admitted");
    }

    fn apply(&mut self, ev: WorkerEvent) -> Option<Notice> {
        let Some(pos) = self.items.iter().position(|it| it.id == ev.id) else {
            // The item was removed while its worker was still running.
            debug!(id = ev.id, "event for removed item dropped");
            return None;
        };

        match ev.kind {
            WorkerEventKind::Progress { downloaded, total } => {
                let item = &mut self.items[pos];
                item.downloaded = downloaded;
                if let Some(t) = total {
                    item.size = Some(t);
                }
                let total = self.items[pos].size;
                Some(Notice::Progress {
                    index: pos,
                    downloaded,
                    total,
                    overall: overall_progress(&self.items),
                })
            }
            WorkerEventKind::Paused => {
                let item = &mut self.items[pos];
                if item.status == DownloadStatus::Downloading {
                    item.status = DownloadStatus::Paused;
                    Some(Notice::StatusChanged {
                        index: pos,
                        status: DownloadStatus::Paused,
                    })
                } else {
                    // Park echo after an explicit pause, or a racing
                    // cancel; the item already shows the right status.
                    None
                }
            }
            WorkerEventKind::Canceled => {
                self.attempt_ended(ev.id);
                let status = self.items[pos].status;
                if status == DownloadStatus::Downloading {
                    // The item was re-admitted while the old attempt was
                    // still winding down; queue it again for a fresh run.
                    self.items[pos].status = DownloadStatus::Queued;
                    self.pump();
                    Some(Notice::StatusChanged {
                        index: pos,
                        status: self.items[pos].status,
                    })
                } else {
                    self.pump();
                    None
                }
            }
            WorkerEventKind::Done { path } => {
                self.attempt_ended(ev.id);
                // The final chunk can race a pause or cancel; the renamed
                // artifact on disk wins, so Done applies unconditionally.
                self.items[pos].status = DownloadStatus::Done;
                self.items[pos].error = None;
                self.pump();
                Some(Notice::Completed { index: pos, path })
            }
            WorkerEventKind::Failed { message } => {
                self.attempt_ended(ev.id);
                let item = &mut self.items[pos];
                if item.status.can_become(DownloadStatus::Error) {
                    item.status = DownloadStatus::Error;
                    item.error = Some(message.clone());
                    self.pump();
                    Some(Notice::Failed {
                        index: pos,
                        message,
                    })
                } else {
                    // A cancel raced the failure; the cancel wins.
                    self.pump();
                    None
                }
            }
        }
    }

    fn attempt_ended(&mut self, id: u64) {
        if let Some(handle) = self.workers.get_mut(&id) {
            handle.live = false;
        }
    }

    /// The batch is ready for the completion trigger once every item is
    /// terminal and no attempt task is still winding down.
    fn batch_ready(&self) -> bool {
        !self.batch_reported
            && self.all_terminal()
            && self.workers.values().all(|h| !h.live)
    }

    async fn run_extraction(&self) -> Option<ExtractionReport> {
        if !self.config.auto_extract {
            info!("all transfers settled; extraction disabled");
            return None;
        }
        let dir = self.config.dest_dir.clone();
        let Some(archive) = extraction::find_first_part(&dir) else {
            info!(dir = %dir.display(), "no archive found to extract");
            return Some(ExtractionReport::NoArchive);
        };

        info!(archive = %archive.display(), "extracting");
        let extractor = Arc::clone(&self.extractor);
        let archive_for_task = archive.clone();
        let out_dir = dir.clone();
        let result =
            tokio::task::spawn_blocking(move || extractor.extract(&archive_for_task, &out_dir))
                .await;

        match result {
            Ok(Ok(())) => {
                info!("extraction complete");
                if self.config.cleanup_after_extract {
                    let dir = dir.clone();
                    let _ = tokio::task::spawn_blocking(move || extraction::cleanup_parts(&dir))
                        .await;
                }
                Some(ExtractionReport::Extracted { archive })
            }
            Ok(Err(e)) => {
                warn!(error = %e, "extraction failed");
                Some(ExtractionReport::Failed {
                    message: e.to_string(),
                })
            }
            Err(e) => {
                warn!(error = %e, "extractor task panicked");
                Some(ExtractionReport::Failed {
                    message: e.to_string(),
                })
            }
        }
    }

    fn reindex(&mut self) {
        for (i, item) in self.items.iter_mut().enumerate() {
            item.index = i;
        }
    }
}
