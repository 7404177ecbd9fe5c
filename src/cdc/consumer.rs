use futures_util::StreamExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheKeystore, Namespace};
use crate::domain::EntityTable;
use crate::queue::DurableQueue;

use super::event::{CdcEvent, CdcOp};

const NAK_DELAY: Duration = Duration::from_millis(500);

/// The CDC consumer's single loop over `DB_CDC`, filtered to `cdc.users`
/// and `cdc.orders`. Per spec.md §5, CDC events arrive in source-commit
/// order per table and invalidation is commutative, so no cross-table
/// ordering is required here — this loop processes whatever the pull
/// consumer hands it, one message at a time. A cancelled `shutdown` only
/// stops the loop from pulling the next message; a message already in hand
/// is always invalidated and acked or nak'd before the loop exits.
#[tracing::instrument(name = "cdc consumer loop", skip(queue, cache, shutdown))]
pub async fn run(queue: DurableQueue, cache: CacheKeystore, shutdown: CancellationToken) -> Result<(), anyhow::Error> {
    let consumer = queue
        .cdc_consumer(&[EntityTable::Users, EntityTable::Orders])
        .await?;
    let mut messages = consumer.messages().await?;

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
                tracing::error!(?error, "error pulling from CDC consumer");
                continue;
            }
        };
        let delivered = crate::queue::dq_wrap(message);

        let event: CdcEvent = match serde_json::from_slice(delivered.payload()) {
            Ok(event) => event,
            Err(error) => {
                tracing::error!(?error, "undecodable CDC event, dropping");
                if let Err(ack_error) = delivered.ack().await {
                    tracing::error!(?ack_error, "failed to ack undecodable CDC event");
                }
                continue;
            }
        };

        if event.op == CdcOp::R {
            if let Err(error) = delivered.ack().await {
                tracing::error!(?error, "failed to ack snapshot-read CDC event");
            }
            continue;
        }

        match invalidate_for(&cache, event.table.0, event.op).await {
            Ok(()) => {
                if let Err(error) = delivered.ack().await {
                    tracing::error!(?error, "failed to ack CDC event");
                }
            }
            Err(error) => {
                tracing::warn!(?error, table = %event.table.0, "cache invalidation failed, nak for redelivery");
                if let Err(nak_error) = delivered.nak_with_delay(NAK_DELAY).await {
                    tracing::error!(?nak_error, "failed to nak CDC event");
                }
            }
        }
    }

    Ok(())
}

async fn invalidate_for(cache: &CacheKeystore, table: EntityTable, op: CdcOp) -> Result<(), redis::RedisError> {
    match table {
        EntityTable::Users => {
            cache.invalidate_namespace(Namespace::Users).await?;
            if op == CdcOp::D {
                cache.invalidate_namespace(Namespace::Orders).await?;
            }
        }
        EntityTable::Orders => {
            cache.invalidate_namespace(Namespace::Orders).await?;
        }
    }
    Ok(())
}
