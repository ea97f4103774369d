//! Queue client wrapper for the game ingestion queue.

use aws_sdk_sqs::Client;
use tracing::debug;

use crate::config::WorkerConfig;
use crate::error::WorkerError;

/// Visibility timeout for dequeued messages, in seconds. Long games outlive
/// this; the worker renews the lease while analysis runs.
pub const VISIBILITY_TIMEOUT_SECS: i32 = 30;

/// A message received from the ingestion queue.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    /// Receipt for deletion/visibility extension of this delivery.
    pub pop_receipt: String,
    /// JSON-encoded game job.
    pub body: String,
}

/// Client for receiving and acknowledging game jobs.
#[derive(Clone)]
pub struct QueueClient {
    client: Client,
    queue_url: String,
}

impl QueueClient {
    pub async fn new(config: &WorkerConfig) -> Result<Self, WorkerError> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let mut builder = aws_sdk_sqs::config::Builder::from(&aws_config);
        if let (Some(name), Some(key)) = (
            &config.storage_account_name,
            &config.storage_account_key,
        ) {
            builder = builder.credentials_provider(aws_sdk_sqs::config::Credentials::new(
                name.clone(),
                key.clone(),
                None,
                None,
                "static",
            ));
        }
        if let Some(endpoint) = &config.queue_endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        let client = Client::from_conf(builder.build());

        let queue_url = client
            .get_queue_url()
            .queue_name(&config.game_ingestion_queue)
            .send()
            .await
            .map_err(|e| WorkerError::Queue(format!("Failed to resolve queue URL: {e}")))?
            .queue_url()
            .ok_or_else(|| WorkerError::Queue("Queue URL missing from response".to_string()))?
            .to_string();

        Ok(Self { client, queue_url })
    }

    /// Receive at most one message, long polling until one is available or
    /// the poll window closes.
    pub async fn dequeue_one(&self) -> Result<Option<QueueMessage>, WorkerError> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(20)
            .visibility_timeout(VISIBILITY_TIMEOUT_SECS)
            .send()
            .await
            .map_err(|e| WorkerError::Queue(format!("Failed to receive message: {e}")))?;

        let message = response.messages().iter().find_map(|msg| {
            let body = msg.body()?;
            let receipt = msg.receipt_handle()?;
            Some(QueueMessage {
                message_id: msg.message_id().unwrap_or_default().to_string(),
                pop_receipt: receipt.to_string(),
                body: body.to_string(),
            })
        });

        debug!(received = message.is_some(), "polled queue");
        Ok(message)
    }

    /// Delete a message after successful processing.
    pub async fn delete(&self, pop_receipt: &str) -> Result<(), WorkerError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(pop_receipt)
            .send()
            .await
            .map_err(|e| WorkerError::Queue(format!("Failed to delete message: {e}")))?;

        debug!("deleted message");
        Ok(())
    }

    /// Extend the visibility timeout of an in-flight message.
    pub async fn extend_visibility(
        &self,
        pop_receipt: &str,
        timeout_seconds: i32,
    ) -> Result<(), WorkerError> {
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(pop_receipt)
            .visibility_timeout(timeout_seconds)
            .send()
            .await
            .map_err(|e| WorkerError::Queue(format!("Failed to extend visibility: {e}")))?;

        debug!(timeout_seconds, "extended visibility");
        Ok(())
    }
}
