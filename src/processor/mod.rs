mod classify;
pub mod protocol;
mod table_handler;

pub use table_handler::TableHandler;

use futures_util::StreamExt;
use sqlx::PgPool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheKeystore;
use crate::domain::EntityTable;
use crate::queue::DurableQueue;

use protocol::ProtocolOutcome;

/// One handler loop per table, per spec.md §5: tables are independent, so a
/// slow or stuck table never blocks another. Runs until `shutdown` fires, the
/// consumer stream ends (connection loss), or an unrecoverable queue error
/// occurs. A cancelled `shutdown` only stops the loop from pulling the next
/// message; a message already in hand is always run through `protocol::run`
/// and acked or nak'd before the loop exits.
#[tracing::instrument(name = "write processor handler loop", skip(pool, cache, queue, shutdown), fields(table = %table))]
pub async fn run_table_handler(
    queue: DurableQueue,
    pool: PgPool,
    cache: CacheKeystore,
    table: EntityTable,
    shutdown: CancellationToken,
) -> Result<(), anyhow::Error> {
    let consumer = queue.writes_consumer(table).await?;
    let mut messages = consumer.messages().await?;
    let max_deliver = queue.settings().max_deliver.max(1) as u64;
    let nak_delay = Duration::from_millis(queue.settings().nak_delay_ms);

    loop {
        let message = tokio::select! {
            () = shutdown.cancelled() => break,
            next = messages.next() => match next {
                Some(message) => message,
                None => break,
            },
        };
        let message = match message {
            Ok(m) => m,
            Err(error) => {
                tracing::error!(?error, "error pulling from writes consumer");
                continue;
            }
        };
        let delivered = crate::queue::dq_wrap(message);

        match protocol::run(&pool, &cache, delivered.payload()).await {
            ProtocolOutcome::Acked => {
                if let Err(error) = delivered.ack().await {
                    tracing::error!(?error, "failed to ack processed message");
                }
            }
            ProtocolOutcome::Retry(error) => {
                let attempt = delivered.delivery_count();
                if attempt >= max_deliver {
                    // Final attempt: dead-letter, then ack only once the DLQ
                    // publish itself is durably acknowledged.
                    let payload = delivered.payload().clone();
                    match queue.publish_dlq(table, payload, &error, attempt).await {
                        Ok(()) => {
                            if let Err(ack_error) = delivered.ack().await {
                                tracing::error!(?ack_error, "failed to ack after dead-lettering");
                            }
                        }
                        Err(dlq_error) => {
                            tracing::error!(?dlq_error, "failed to publish to DLQ, leaving message for redelivery");
                        }
                    }
                } else if let Err(nak_error) = delivered.nak_with_delay(nak_delay).await {
                    tracing::error!(?nak_error, "failed to nak message");
                }
            }
        }
    }

    Ok(())
}
