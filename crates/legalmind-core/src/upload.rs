use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{AnalysisBackend, TokenProvider};
use crate::config::Config;
use crate::error::{ApiError, ValidationError};
use crate::types::{stage_ordinal, AnalysisEvent, JobState, TaskStatus, UploadTask};

pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf"];

/// Validate a candidate upload before anything touches the network.
pub fn validate(file_name: &str, size: u64) -> Result<(), ValidationError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ValidationError::UnsupportedFormat(ext));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(ValidationError::FileTooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// A file handed to [`Uploader::enqueue`].
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

impl IncomingFile {
    pub fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let size = std::fs::metadata(&path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self { path, name, size })
    }
}

/// Upload/analysis orchestrator.
///
/// Owns the task list and a registry of polling jobs, one per submitted
/// upload, each with its own cancellation token. Progress and terminal
/// resolutions are broadcast as [`AnalysisEvent`]s.
pub struct Uploader {
    backend: Arc<dyn AnalysisBackend>,
    auth: Arc<dyn TokenProvider>,
    tasks: Mutex<Vec<UploadTask>>,
    /// Active poll loops keyed by job id.
    jobs: Mutex<HashMap<String, CancellationToken>>,
    event_tx: broadcast::Sender<AnalysisEvent>,
    next_task: AtomicU64,
    poll_interval: Duration,
    poll_backoff: Duration,
    shutdown: CancellationToken,
}

impl Uploader {
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        auth: Arc<dyn TokenProvider>,
        config: &Config,
    ) -> (Arc<Self>, broadcast::Receiver<AnalysisEvent>) {
        let (tx, rx) = broadcast::channel(256);
        let uploader = Arc::new(Self {
            backend,
            auth,
            tasks: Mutex::new(Vec::new()),
            jobs: Mutex::new(HashMap::new()),
            event_tx: tx,
            next_task: AtomicU64::new(1),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            poll_backoff: Duration::from_millis(config.poll_backoff_ms),
            shutdown: CancellationToken::new(),
        });
        (uploader, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.event_tx.subscribe()
    }

    /// Current task list snapshot.
    pub async fn tasks(&self) -> Vec<UploadTask> {
        self.tasks.lock().await.clone()
    }

    pub async fn active_jobs(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Append one task per file, each validated independently. Invalid
    /// files land directly in `error`; valid ones in `pending`. Returns the
    /// new task ids in insertion order.
    pub async fn enqueue(&self, files: Vec<IncomingFile>) -> Vec<String> {
        let mut ids = Vec::with_capacity(files.len());
        let mut tasks = self.tasks.lock().await;
        let mut next = tasks.clone();
        for file in files {
            let n = self.next_task.fetch_add(1, Ordering::Relaxed);
            let stem = Path::new(&file.name)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "file".into());
            let id = format!("task-{n}-{stem}");
            let (status, error) = match validate(&file.name, file.size) {
                Ok(()) => (TaskStatus::Pending, None),
                Err(e) => (TaskStatus::Error, Some(e.to_string())),
            };
            next.push(UploadTask {
                id: id.clone(),
                file_name: file.name,
                file_path: file.path.to_string_lossy().to_string(),
                size: file.size,
                progress: 0,
                status,
                error,
                job_id: None,
                last_job_status: None,
            });
            ids.push(id);
        }
        *tasks = next;
        ids
    }

    /// Submit the first pending task (single-file analysis pipeline: one
    /// submission per user action even when several are queued). Returns the
    /// job id, or None when nothing is pending. Submission failures are
    /// terminal for the task and re-raised.
    pub async fn submit(self: Arc<Self>) -> Result<Option<String>, ApiError> {
        let task = {
            let tasks = self.tasks.lock().await;
            tasks.iter().find(|t| t.status == TaskStatus::Pending).cloned()
        };
        let Some(task) = task else {
            return Ok(None);
        };

        self.replace_task(&task.id, |t| t.status = TaskStatus::Uploading).await;

        let bytes = match tokio::fs::read(&task.file_path).await {
            Ok(b) => b,
            Err(e) => {
                let message = format!("read {}: {e}", task.file_path);
                self.replace_task(&task.id, |t| {
                    t.status = TaskStatus::Error;
                    t.error = Some(message.clone());
                })
                .await;
                return Err(ApiError::Transport(message));
            }
        };

        let user_id = self.auth.user_id();
        let result = self
            .backend
            .upload(&task.file_name, bytes, user_id.as_deref())
            .await;

        if self.shutdown.is_cancelled() {
            return Ok(None);
        }

        match result {
            Ok(receipt) => {
                info!(job_id = %receipt.job_id, file = %task.file_name, "upload accepted");
                let job_id = receipt.job_id;
                self.replace_task(&task.id, |t| {
                    t.status = TaskStatus::Processing;
                    t.job_id = Some(job_id.clone());
                })
                .await;

                // Register the poll loop under its own cancellation token.
                let token = self.shutdown.child_token();
                self.jobs.lock().await.insert(job_id.clone(), token.clone());
                let this = Arc::clone(&self);
                let task_id = task.id.clone();
                let poll_job_id = job_id.clone();
                tokio::spawn(async move {
                    this.poll_job(task_id, poll_job_id, token).await;
                });

                Ok(Some(job_id))
            }
            Err(e) => {
                warn!(file = %task.file_name, "upload failed: {e}");
                let message = e.to_string();
                self.replace_task(&task.id, |t| {
                    t.status = TaskStatus::Error;
                    t.error = Some(message.clone());
                })
                .await;
                Err(e)
            }
        }
    }

    /// Strictly sequential poll loop for one job: await each response before
    /// scheduling the next tick. Transport errors back off to the slower
    /// interval and keep polling; only an explicit `failed` status fails the
    /// task. The cancellation token gates every post-await mutation.
    async fn poll_job(self: Arc<Self>, task_id: String, job_id: String, cancel: CancellationToken) {
        let mut delay = self.poll_interval;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%job_id, "poll loop cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let status = match self.backend.job_status(&job_id).await {
                Ok(s) => {
                    delay = self.poll_interval;
                    s
                }
                Err(e) => {
                    warn!(%job_id, "job status fetch failed, retrying: {e}");
                    delay = self.poll_backoff;
                    continue;
                }
            };

            if cancel.is_cancelled() {
                return;
            }

            let snapshot = status.clone();
            self.replace_task(&task_id, |t| {
                t.progress = snapshot.progress;
                t.last_job_status = Some(snapshot.clone());
            })
            .await;

            match status.status {
                JobState::Completed => {
                    let Some(result) = status.result else {
                        self.finish_failed(&task_id, &job_id, "analysis completed without a result")
                            .await;
                        return;
                    };
                    self.replace_task(&task_id, |t| {
                        t.status = TaskStatus::Complete;
                        t.progress = 100;
                    })
                    .await;
                    self.jobs.lock().await.remove(&job_id);
                    info!(%job_id, document_id = %result.document_id, "analysis complete");
                    let _ = self.event_tx.send(AnalysisEvent::Completed {
                        job_id,
                        document_id: result.document_id,
                    });
                    return;
                }
                JobState::Failed => {
                    let message = status
                        .error
                        .unwrap_or_else(|| "analysis failed".to_string());
                    self.finish_failed(&task_id, &job_id, &message).await;
                    return;
                }
                JobState::Pending | JobState::Processing => {
                    let _ = self.event_tx.send(AnalysisEvent::Progress {
                        job_id: job_id.clone(),
                        stage: status.stage.clone(),
                        step: stage_ordinal(&status.stage),
                        progress: status.progress,
                    });
                }
            }
        }
    }

    async fn finish_failed(&self, task_id: &str, job_id: &str, message: &str) {
        warn!(job_id, "analysis failed: {message}");
        self.replace_task(task_id, |t| {
            t.status = TaskStatus::Error;
            t.error = Some(message.to_string());
        })
        .await;
        self.jobs.lock().await.remove(job_id);
        let _ = self.event_tx.send(AnalysisEvent::Failed {
            job_id: job_id.to_string(),
            message: message.to_string(),
        });
    }

    /// Abandon one job: its poll loop stops before its next mutation.
    pub async fn cancel(&self, job_id: &str) {
        if let Some(token) = self.jobs.lock().await.remove(job_id) {
            token.cancel();
            debug!(job_id, "job abandoned");
        }
    }

    /// Tear down the orchestrator: every registered poll loop observes the
    /// cancellation before touching state again.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Swap in a rebuilt task list with one entry patched, so readers only
    /// ever observe complete snapshots.
    async fn replace_task(&self, id: &str, patch: impl FnOnce(&mut UploadTask)) {
        let mut tasks = self.tasks.lock().await;
        let mut next = tasks.clone();
        if let Some(t) = next.iter_mut().find(|t| t.id == id) {
            patch(t);
        }
        *tasks = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_pdf_extensions() {
        for name in ["contract.docx", "scan.png", "notes.txt", "archive"] {
            assert!(matches!(
                validate(name, 1024),
                Err(ValidationError::UnsupportedFormat(_))
            ));
        }
    }

    #[test]
    fn accepts_pdf_case_insensitively() {
        assert!(validate("contract.pdf", 1024).is_ok());
        assert!(validate("CONTRACT.PDF", 1024).is_ok());
    }

    #[test]
    fn size_ceiling_is_inclusive() {
        assert!(validate("a.pdf", MAX_UPLOAD_BYTES).is_ok());
        assert!(matches!(
            validate("a.pdf", MAX_UPLOAD_BYTES + 1),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }
}
