//! Submission executor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Semaphore};
use tracing::{info, warn};

use vlens_queue::{Claim, IngestionQueue};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::SubmissionLogger;
use crate::metrics::{record_submission, set_active_workers};
use crate::processor::SubmissionProcessor;

/// Worker pool that drains the ingestion queue.
pub struct SubmissionExecutor {
    config: WorkerConfig,
    queue: Arc<IngestionQueue>,
    processor: Arc<dyn SubmissionProcessor>,
    permits: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

impl SubmissionExecutor {
    pub fn new(
        config: WorkerConfig,
        queue: Arc<IngestionQueue>,
        processor: Arc<dyn SubmissionProcessor>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_workers.max(1)));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            queue,
            processor,
            permits,
            shutdown,
        }
    }

    /// Claim and process submissions until shutdown is signalled.
    ///
    /// A worker slot is reserved before a submission is claimed, so with a
    /// single slot submissions finish in admission order.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting submission executor with {} workers",
            self.config.max_concurrent_workers
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            let permit = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown_rx) => break,
                permit = self.permits.clone().acquire_owned() => permit
                    .map_err(|_| WorkerError::processing_failed("worker pool closed"))?,
            };

            let claim = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown_rx) => break,
                claim = self.queue.next() => claim,
            };

            let queue = Arc::clone(&self.queue);
            let processor = Arc::clone(&self.processor);
            let job_timeout = self.config.job_timeout;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute(queue, processor, claim, job_timeout).await;
            });
        }

        info!("Shutdown signal received, waiting for in-flight submissions...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_idle())
            .await
            .is_err()
        {
            warn!(
                timeout_secs = self.config.shutdown_timeout.as_secs(),
                "In-flight submissions still running at shutdown"
            );
        }

        info!("Submission executor stopped");
        Ok(())
    }

    /// Run one claimed submission to a terminal state.
    async fn execute(
        queue: Arc<IngestionQueue>,
        processor: Arc<dyn SubmissionProcessor>,
        claim: Claim,
        job_timeout: Duration,
    ) {
        let Claim {
            submission,
            mut cancel,
        } = claim;
        let logger = SubmissionLogger::new(&submission);
        logger.log_start(&format!("{} bytes", submission.size_bytes));
        set_active_workers(queue.active_len().await);

        let start = Instant::now();
        let result = tokio::select! {
            result = tokio::time::timeout(job_timeout, processor.process(&submission, &queue)) => {
                result.unwrap_or_else(|_| Err(WorkerError::Timeout(job_timeout.as_secs())))
            }
            _ = cancel.cancelled() => Err(WorkerError::Cancelled),
        };
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(video_id) => match queue.complete(&submission.id, video_id.clone()).await {
                Ok(_) => {
                    logger.log_completion(&format!("stored as video {}", video_id));
                    record_submission("complete", elapsed);
                }
                Err(e) => {
                    logger.log_error(&format!("could not record completion: {}", e));
                    record_submission("failed", elapsed);
                }
            },
            Err(e) => {
                if e.is_fatal() {
                    logger.log_error(&e.to_string());
                } else {
                    logger.log_warning(&e.to_string());
                }
                if let Err(qe) = queue.fail(&submission.id, e.to_string()).await {
                    warn!(submission_id = %submission.id, "Failed to record failure: {}", qe);
                }
                record_submission(e.outcome(), elapsed);
            }
        }

        set_active_workers(queue.active_len().await);
    }

    /// Wait for all in-flight submissions to finish.
    async fn wait_for_idle(&self) {
        let slots = self.config.max_concurrent_workers.max(1);
        while self.permits.available_permits() < slots {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn queue(&self) -> &Arc<IngestionQueue> {
        &self.queue
    }
}
