use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::clients::{EventError, PostEventsInput, WebhookClient};
use crate::error::{ErrorKind, SyncResult};

/// Failures injected into [`MockWebhookClient`].
#[derive(Debug, Clone, Default)]
pub struct WebhookFaults {
    /// Positions of the events rejected in every posted batch.
    pub reject_event_indices: Vec<usize>,
    /// Fails every post as a whole.
    pub fail_transport: bool,
}

/// [`WebhookClient`] recording the batches it receives. Clones share the recorded batches.
#[derive(Debug, Clone, Default)]
pub struct MockWebhookClient {
    posted: Arc<Mutex<Vec<PostEventsInput>>>,
    faults: WebhookFaults,
}

impl MockWebhookClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: WebhookFaults) -> Self {
        Self {
            posted: Arc::default(),
            faults,
        }
    }

    /// Returns the batches accepted so far, in posting order.
    pub async fn posted(&self) -> Vec<PostEventsInput> {
        self.posted.lock().await.clone()
    }
}

impl WebhookClient for MockWebhookClient {
    async fn post_events(&self, input: PostEventsInput) -> SyncResult<Vec<EventError>> {
        if self.faults.fail_transport {
            bail!(
                ErrorKind::DeliveryFailed,
                "Injected webhook transport failure",
                input.webhook_url
            );
        }

        let rejected = self
            .faults
            .reject_event_indices
            .iter()
            .filter(|index| **index < input.events.len())
            .map(|index| EventError {
                index: *index,
                message: "rejected by test webhook".to_string(),
            })
            .collect();

        self.posted.lock().await.push(input);

        Ok(rejected)
    }
}
