//! One worker: drain the ingestion queue, analyze games, persist puzzles.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::db::PuzzleStore;
use crate::error::WorkerError;
use crate::job::GameJob;
use crate::queue::{QueueClient, QueueMessage, VISIBILITY_TIMEOUT_SECS};

/// How often an in-flight message's visibility lease is re-extended. Kept
/// under the lease so a renewal always lands before expiry.
const LEASE_RENEWAL_SECS: u64 = 20;

/// Pause after a transient dequeue error before retrying.
const DEQUEUE_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Worker loop: runs until the shutdown flag flips.
pub async fn run(
    worker_id: usize,
    queue: QueueClient,
    store: PuzzleStore,
    config: WorkerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(worker_id, "worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let message = tokio::select! {
            _ = shutdown.changed() => break,
            result = queue.dequeue_one() => match result {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    error!(worker_id, error = %e, "failed to dequeue message");
                    tokio::select! {
                        _ = tokio::time::sleep(DEQUEUE_RETRY_BACKOFF) => continue,
                        _ = shutdown.changed() => break,
                    }
                }
            }
        };

        if let Err(e) = process_message(&queue, &store, &config, &mut shutdown, &message).await {
            error!(
                worker_id,
                message_id = %message.message_id,
                error = %e,
                "failed to process message"
            );
        }
    }

    info!(worker_id, "worker stopped");
}

/// Handle one dequeued message end to end. The message is deleted only
/// after its payload decoded, the game was analyzed to completion, and
/// every puzzle was inserted; any earlier exit leaves it to reappear once
/// its visibility lease lapses.
async fn process_message(
    queue: &QueueClient,
    store: &PuzzleStore,
    config: &WorkerConfig,
    shutdown: &mut watch::Receiver<bool>,
    message: &QueueMessage,
) -> Result<(), WorkerError> {
    info!(
        message_id = %message.message_id,
        bytes = message.body.len(),
        "received message"
    );

    let job: GameJob = match serde_json::from_str(&message.body) {
        Ok(job) => job,
        Err(e) => {
            warn!(
                message_id = %message.message_id,
                error = %e,
                "skipping message with malformed payload"
            );
            return Ok(());
        }
    };

    info!(
        game_url = %job.game_url,
        move_count = job.uci_moves.len(),
        "processing game"
    );

    // Game analysis routinely outlives the visibility lease; keep renewing
    // it until the game is done.
    let lease = tokio::spawn(renew_lease(queue.clone(), message.pop_receipt.clone()));
    let options = config.analysis_options();
    let result = tactics::find_puzzles(&options, &job.uci_moves, shutdown).await;
    lease.abort();

    let puzzles = result?;
    if *shutdown.borrow() {
        // Cancelled mid-game: nothing is persisted, the message redelivers.
        return Ok(());
    }

    info!(game_url = %job.game_url, puzzle_count = puzzles.len(), "identified puzzles");
    for puzzle in &puzzles {
        store.insert_puzzle(&job, puzzle).await?;
    }
    queue.delete(&message.pop_receipt).await?;
    Ok(())
}

async fn renew_lease(queue: QueueClient, pop_receipt: String) {
    loop {
        tokio::time::sleep(Duration::from_secs(LEASE_RENEWAL_SECS)).await;
        if let Err(e) = queue
            .extend_visibility(&pop_receipt, VISIBILITY_TIMEOUT_SECS)
            .await
        {
            warn!(error = %e, "failed to renew message lease");
        }
    }
}
