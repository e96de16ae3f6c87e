//! Bounded FIFO of submissions with admission dedup and state tracking.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio::sync::{watch, Mutex, Notify};
use tracing::{debug, info, warn};
use vlens_models::{
    ContentKey, FailureReport, SubmissionId, SubmissionState, SubmissionStatus, VideoId,
    VideoSubmission,
};

use crate::error::{QueueError, QueueResult};
use crate::progress::ProgressChannel;

/// Message recorded on submissions removed by a cancel request.
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Max submissions waiting to be claimed
    pub capacity: usize,
    /// Finished submissions kept for status lookups
    pub history_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            history_limit: 256,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: std::env::var("QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.capacity),
            history_limit: std::env::var("QUEUE_HISTORY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.history_limit),
        }
    }
}

/// Result of an enqueue call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub id: SubmissionId,
    /// True when the content key was already queued or active
    pub duplicate: bool,
}

/// What a cancel request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The submission was still waiting and has been removed
    Removed,
    /// The owning worker has been signalled
    Signalled,
}

/// Cancel signal handed to the worker that owns a submission.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the queue
    /// drops the submission without cancelling it.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// A submission claimed by a worker.
#[derive(Debug)]
pub struct Claim {
    pub submission: VideoSubmission,
    pub cancel: CancelSignal,
}

struct Entry {
    submission: VideoSubmission,
    status: SubmissionStatus,
    cancel: Option<watch::Sender<bool>>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<SubmissionId>,
    entries: HashMap<SubmissionId, Entry>,
    keys: HashMap<ContentKey, SubmissionId>,
    /// Every tracked submission in admission order
    admitted: VecDeque<SubmissionId>,
}

impl QueueState {
    fn active_len(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.status.state.is_active())
            .count()
    }

    fn is_finished(&self, id: &SubmissionId) -> bool {
        self.entries
            .get(id)
            .is_some_and(|e| e.status.state.is_terminal())
    }

    fn evict_history(&mut self, limit: usize) {
        let mut finished = self.admitted.iter().filter(|id| self.is_finished(id)).count();
        while finished > limit {
            let Some(pos) = self.admitted.iter().position(|id| self.is_finished(id)) else {
                break;
            };
            if let Some(id) = self.admitted.remove(pos) {
                self.entries.remove(&id);
            }
            finished -= 1;
        }
    }
}

/// In-process ingestion queue.
pub struct IngestionQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
    notify: Notify,
    progress: ProgressChannel,
}

impl IngestionQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            progress: ProgressChannel::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn progress(&self) -> &ProgressChannel {
        &self.progress
    }

    /// Admit a submission.
    ///
    /// A content key that is already queued or active is not admitted twice;
    /// the existing ID is returned with `duplicate` set.
    pub async fn enqueue(&self, submission: VideoSubmission) -> QueueResult<Admission> {
        let key = submission.content_key();
        let mut state = self.state.lock().await;

        if let Some(existing) = state.keys.get(&key) {
            debug!(submission_id = %existing, key = %key, "Duplicate submission ignored");
            counter!("vlens_queue_duplicates_total").increment(1);
            return Ok(Admission {
                id: existing.clone(),
                duplicate: true,
            });
        }

        if state.pending.len() >= self.config.capacity {
            warn!(key = %key, capacity = self.config.capacity, "Queue full, rejecting submission");
            counter!("vlens_queue_rejected_total").increment(1);
            return Err(QueueError::Full {
                capacity: self.config.capacity,
            });
        }

        let id = submission.id.clone();
        let status = SubmissionStatus::queued(&submission);
        state.keys.insert(key, id.clone());
        state.pending.push_back(id.clone());
        state.admitted.push_back(id.clone());
        state.entries.insert(
            id.clone(),
            Entry {
                submission,
                status: status.clone(),
                cancel: None,
            },
        );
        gauge!("vlens_queue_depth").set(state.pending.len() as f64);
        drop(state);

        info!(submission_id = %id, name = %status.name, size_bytes = status.size_bytes, "Enqueued submission");
        self.progress.publish(&status);
        self.notify.notify_one();

        Ok(Admission {
            id,
            duplicate: false,
        })
    }

    /// Claim the oldest waiting submission without blocking.
    ///
    /// The claimed submission moves to `Extracting`.
    pub async fn try_next(&self) -> Option<Claim> {
        let mut state = self.state.lock().await;
        while let Some(id) = state.pending.pop_front() {
            let Some(entry) = state.entries.get_mut(&id) else {
                continue;
            };
            if entry.status.state != SubmissionState::Queued {
                continue;
            }

            let (tx, rx) = watch::channel(false);
            entry.cancel = Some(tx);
            entry.status.state = SubmissionState::Extracting;
            entry.status.updated_at = Utc::now();
            let claim = Claim {
                submission: entry.submission.clone(),
                cancel: CancelSignal { rx },
            };
            let status = entry.status.clone();
            gauge!("vlens_queue_depth").set(state.pending.len() as f64);
            drop(state);

            self.progress.publish(&status);
            return Some(claim);
        }
        None
    }

    /// Claim the oldest waiting submission, waiting for one to arrive.
    pub async fn next(&self) -> Claim {
        loop {
            if let Some(claim) = self.try_next().await {
                return claim;
            }
            self.notify.notified().await;
        }
    }

    /// Move an active submission along the success path.
    pub async fn advance(&self, id: &SubmissionId, to: SubmissionState) -> QueueResult<SubmissionStatus> {
        if to.is_terminal() {
            let from = self.current_state(id).await?;
            return Err(QueueError::InvalidTransition {
                id: id.to_string(),
                from,
                to,
            });
        }
        self.transition(id, to, |_| {}).await
    }

    /// Mark a submission complete with the ID of its stored video.
    pub async fn complete(&self, id: &SubmissionId, video_id: VideoId) -> QueueResult<SubmissionStatus> {
        self.transition(id, SubmissionState::Complete, |status| {
            status.video_id = Some(video_id);
        })
        .await
    }

    /// Mark a submission failed. Failed submissions are never retried.
    pub async fn fail(&self, id: &SubmissionId, message: impl Into<String>) -> QueueResult<SubmissionStatus> {
        let message = message.into();
        self.transition(id, SubmissionState::Failed, |status| {
            status.error = Some(FailureReport {
                submission_id: status.id.clone(),
                file_name: status.name.clone(),
                message,
            });
        })
        .await
    }

    /// Cancel a submission.
    ///
    /// A waiting submission fails immediately; an active one has its
    /// worker signalled and is failed by that worker.
    pub async fn cancel(&self, id: &SubmissionId) -> QueueResult<CancelOutcome> {
        {
            let mut state = self.state.lock().await;
            let current = state
                .entries
                .get(id)
                .map(|e| e.status.state)
                .ok_or_else(|| QueueError::not_found(id.as_str()))?;

            if current.is_terminal() {
                return Err(QueueError::AlreadyFinished(id.to_string()));
            }
            if current != SubmissionState::Queued {
                if let Some(tx) = state.entries.get(id).and_then(|e| e.cancel.as_ref()) {
                    let _ = tx.send(true);
                }
                info!(submission_id = %id, "Cancellation signalled to worker");
                return Ok(CancelOutcome::Signalled);
            }
            state.pending.retain(|pending| pending != id);
        }

        self.fail(id, CANCELLED_MESSAGE).await?;
        info!(submission_id = %id, "Cancelled queued submission");
        Ok(CancelOutcome::Removed)
    }

    pub async fn status(&self, id: &SubmissionId) -> Option<SubmissionStatus> {
        self.state
            .lock()
            .await
            .entries
            .get(id)
            .map(|e| e.status.clone())
    }

    /// All tracked submissions in admission order.
    pub async fn list(&self) -> Vec<SubmissionStatus> {
        let state = self.state.lock().await;
        state
            .admitted
            .iter()
            .filter_map(|id| state.entries.get(id).map(|e| e.status.clone()))
            .collect()
    }

    /// Submissions waiting to be claimed.
    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Submissions currently held by a worker.
    pub async fn active_len(&self) -> usize {
        self.state.lock().await.active_len()
    }

    async fn current_state(&self, id: &SubmissionId) -> QueueResult<SubmissionState> {
        self.status(id)
            .await
            .map(|s| s.state)
            .ok_or_else(|| QueueError::not_found(id.as_str()))
    }

    async fn transition<F>(&self, id: &SubmissionId, to: SubmissionState, update: F) -> QueueResult<SubmissionStatus>
    where
        F: FnOnce(&mut SubmissionStatus),
    {
        let (status, source) = {
            let mut state = self.state.lock().await;
            let entry = state
                .entries
                .get_mut(id)
                .ok_or_else(|| QueueError::not_found(id.as_str()))?;

            let from = entry.status.state;
            if !from.can_transition_to(to) {
                return Err(QueueError::InvalidTransition {
                    id: id.to_string(),
                    from,
                    to,
                });
            }

            entry.status.state = to;
            entry.status.updated_at = Utc::now();
            update(&mut entry.status);
            let status = entry.status.clone();

            let mut source: Option<PathBuf> = None;
            if to.is_terminal() {
                entry.cancel = None;
                source = Some(entry.submission.source_path.clone());
                let key = entry.submission.content_key();
                if state.keys.get(&key) == Some(id) {
                    state.keys.remove(&key);
                }
                state.evict_history(self.config.history_limit);
            }
            (status, source)
        };

        debug!(submission_id = %id, state = %status.state, "Submission state changed");
        self.progress.publish(&status);

        if let Some(path) = source {
            remove_source(&path).await;
        }
        Ok(status)
    }
}

/// Source bytes are dropped once a submission is finished.
async fn remove_source(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed submission source"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove submission source: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn submission(name: &str, size: u64) -> VideoSubmission {
        VideoSubmission::new(name, size, format!("/nonexistent/{}", name))
    }

    fn queue() -> IngestionQueue {
        IngestionQueue::new(QueueConfig::default())
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected_until_terminal() {
        let queue = queue();
        let first = queue.enqueue(submission("clip.mp4", 100)).await.unwrap();
        assert!(!first.duplicate);

        let claim = queue.try_next().await.unwrap();
        assert_eq!(claim.submission.id, first.id);

        // Same name and size while the first is active.
        let again = queue.enqueue(submission("clip.mp4", 100)).await.unwrap();
        assert!(again.duplicate);
        assert_eq!(again.id, first.id);
        assert_eq!(queue.pending_len().await, 0);

        // Different size is a different file.
        let other = queue.enqueue(submission("clip.mp4", 101)).await.unwrap();
        assert!(!other.duplicate);

        queue.complete(&first.id, VideoId::from("v1")).await.unwrap_err();
        for state in [
            SubmissionState::AwaitingTranscription,
            SubmissionState::Analyzing,
            SubmissionState::Saving,
        ] {
            queue.advance(&first.id, state).await.unwrap();
        }
        let done = queue.complete(&first.id, VideoId::from("v1")).await.unwrap();
        assert_eq!(done.state, SubmissionState::Complete);
        assert_eq!(done.video_id, Some(VideoId::from("v1")));

        let readmitted = queue.enqueue(submission("clip.mp4", 100)).await.unwrap();
        assert!(!readmitted.duplicate);
        assert_ne!(readmitted.id, first.id);
    }

    #[tokio::test]
    async fn test_back_to_back_duplicate_while_queued() {
        let queue = queue();
        let first = queue.enqueue(submission("clip.mp4", 1000)).await.unwrap();
        let second = queue.enqueue(submission("clip.mp4", 1000)).await.unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(second.id, first.id);
        assert_eq!(queue.pending_len().await, 1);
        assert_eq!(queue.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = queue();
        let a = queue.enqueue(submission("a.mp4", 1)).await.unwrap();
        let b = queue.enqueue(submission("b.mp4", 1)).await.unwrap();
        let c = queue.enqueue(submission("c.mp4", 1)).await.unwrap();

        for expected in [a.id, b.id, c.id] {
            assert_eq!(queue.try_next().await.unwrap().submission.id, expected);
        }
        assert!(queue.try_next().await.is_none());
        assert_eq!(queue.active_len().await, 3);
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let queue = IngestionQueue::new(QueueConfig {
            capacity: 2,
            ..QueueConfig::default()
        });
        queue.enqueue(submission("a.mp4", 1)).await.unwrap();
        queue.enqueue(submission("b.mp4", 1)).await.unwrap();
        let err = queue.enqueue(submission("c.mp4", 1)).await.unwrap_err();
        assert!(matches!(err, QueueError::Full { capacity: 2 }));

        // Claiming frees a slot.
        queue.try_next().await.unwrap();
        queue.enqueue(submission("c.mp4", 1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_illegal_transitions_rejected() {
        let queue = queue();
        let admitted = queue.enqueue(submission("a.mp4", 1)).await.unwrap();

        // Still queued: cannot jump ahead.
        let err = queue
            .advance(&admitted.id, SubmissionState::Analyzing)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidTransition { .. }));

        queue.try_next().await.unwrap();
        queue.fail(&admitted.id, "decode failed").await.unwrap();

        // Terminal states are final.
        assert!(queue
            .advance(&admitted.id, SubmissionState::AwaitingTranscription)
            .await
            .is_err());
        assert!(queue.fail(&admitted.id, "again").await.is_err());

        let status = queue.status(&admitted.id).await.unwrap();
        let report = status.error.unwrap();
        assert_eq!(report.file_name, "a.mp4");
        assert_eq!(report.message, "decode failed");
    }

    #[tokio::test]
    async fn test_cancel_queued_and_active() {
        let queue = queue();
        let active = queue.enqueue(submission("a.mp4", 1)).await.unwrap();
        let waiting = queue.enqueue(submission("b.mp4", 1)).await.unwrap();

        let mut claim = queue.try_next().await.unwrap();
        assert!(!claim.cancel.is_cancelled());

        assert_eq!(queue.cancel(&waiting.id).await.unwrap(), CancelOutcome::Removed);
        assert_eq!(
            queue.status(&waiting.id).await.unwrap().state,
            SubmissionState::Failed
        );
        assert!(queue.try_next().await.is_none());

        assert_eq!(queue.cancel(&active.id).await.unwrap(), CancelOutcome::Signalled);
        tokio::time::timeout(Duration::from_secs(1), claim.cancel.cancelled())
            .await
            .unwrap();

        queue.fail(&active.id, CANCELLED_MESSAGE).await.unwrap();
        assert!(matches!(
            queue.cancel(&active.id).await,
            Err(QueueError::AlreadyFinished(_))
        ));
        assert!(matches!(
            queue.cancel(&SubmissionId::from("missing")).await,
            Err(QueueError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_terminal_state_removes_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        tokio::fs::write(&path, b"bytes").await.unwrap();

        let queue = queue();
        let admitted = queue
            .enqueue(VideoSubmission::new("a.mp4", 5, &path))
            .await
            .unwrap();
        queue.try_next().await.unwrap();
        assert!(path.exists());

        queue.fail(&admitted.id, "boom").await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_next_waits_for_enqueue() {
        let queue = queue();
        let mut next = tokio_test::task::spawn(queue.next());
        tokio_test::assert_pending!(next.poll());

        queue.enqueue(submission("late.mp4", 1)).await.unwrap();
        assert!(next.is_woken());

        let claim = tokio_test::assert_ready!(next.poll());
        assert_eq!(claim.submission.name, "late.mp4");
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let queue = IngestionQueue::new(QueueConfig {
            capacity: 8,
            history_limit: 2,
        });
        let mut ids = Vec::new();
        for i in 0..4 {
            let admitted = queue.enqueue(submission(&format!("{}.mp4", i), 1)).await.unwrap();
            queue.cancel(&admitted.id).await.unwrap();
            ids.push(admitted.id);
        }

        let listed: Vec<_> = queue.list().await.into_iter().map(|s| s.id).collect();
        assert_eq!(listed, ids[2..].to_vec());
    }

    #[tokio::test]
    async fn test_status_changes_are_published() {
        let queue = queue();
        let mut events = queue.progress().subscribe();

        let admitted = queue.enqueue(submission("a.mp4", 1)).await.unwrap();
        queue.try_next().await.unwrap();
        queue.fail(&admitted.id, "x").await.unwrap();

        let states: Vec<_> = [
            events.recv().await.unwrap(),
            events.recv().await.unwrap(),
            events.recv().await.unwrap(),
        ]
        .into_iter()
        .map(|s| s.state)
        .collect();
        assert_eq!(
            states,
            vec![
                SubmissionState::Queued,
                SubmissionState::Extracting,
                SubmissionState::Failed
            ]
        );
    }
}
