//! Status change notifications.

use tokio::sync::broadcast;
use tracing::debug;
use vlens_models::SubmissionStatus;

/// Buffered events per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Fan-out of submission status changes to any number of listeners.
#[derive(Debug, Clone)]
pub struct ProgressChannel {
    sender: broadcast::Sender<SubmissionStatus>,
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish a status snapshot. Having no listeners is not an error.
    pub fn publish(&self, status: &SubmissionStatus) {
        let delivered = self.sender.send(status.clone()).unwrap_or(0);
        debug!(
            submission_id = %status.id,
            state = %status.state,
            listeners = delivered,
            "Published status change"
        );
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SubmissionStatus> {
        self.sender.subscribe()
    }
}
