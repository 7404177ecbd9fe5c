use sqlx::PgPool;

use crate::cache::CacheKeystore;
use crate::domain::QueuedWrite;
use crate::ledger::{self, PendingInsert};

use super::classify::{classify, ErrorClass};
use super::table_handler::{DomainWriteError, TableHandler};

/// What the consume loop should do with the delivery once the protocol has
/// run. `Acked` covers every terminal case (success, duplicate skip,
/// non-retryable failure recorded) — anything that reached a stable ledger
/// state gets acked immediately. `Retry` is the only case the consume loop
/// still has a decision to make (nak vs. dead-letter), since that decision
/// depends on the delivery count the protocol itself doesn't track.
pub enum ProtocolOutcome {
    Acked,
    Retry(String),
}

/// The write protocol of the core spec, steps 1-9, run once per inbound
/// message. Never touches the queue message itself (no ack/nak) — that's
/// the consume loop's job, driven by the returned `ProtocolOutcome`.
#[tracing::instrument(name = "write protocol", skip(pool, cache, payload), fields(operation_id = tracing::field::Empty))]
pub async fn run(pool: &PgPool, cache: &CacheKeystore, payload: &[u8]) -> ProtocolOutcome {
    // Step 1: decode. A message that doesn't even parse carries no
    // operation_id to key a ledger row on, so there is nothing to record;
    // best effort here means "log and move on", not "persist a failure".
    let write: QueuedWrite = match serde_json::from_slice(payload) {
        Ok(w) => w,
        Err(error) => {
            tracing::error!(?error, "failed to decode queued write, dropping message");
            return ProtocolOutcome::Acked;
        }
    };
    tracing::Span::current().record("operation_id", tracing::field::display(write.operation_id));

    // Step 2: resolve entity_id. `Create` mints a fresh one; `Update`/
    // `Delete` target the row `data` already names.
    let handler = TableHandler::for_table(write.table);
    let entity_id = match handler.resolve_entity_id(write.op_type, &write.data) {
        Ok(id) => id,
        Err(error) => return handle_domain_error(pool, &write, uuid::Uuid::new_v4(), error).await,
    };

    // Step 3: open transaction.
    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(error) => {
            tracing::warn!(?error, "failed to open transaction");
            return ProtocolOutcome::Retry(error.to_string());
        }
    };

    // Step 4: the idempotency pivot.
    match ledger::try_insert_pending(&mut tx, write.operation_id, write.table, entity_id, write.op_type).await {
        Ok(PendingInsert::AlreadyExists) => {
            let _ = tx.rollback().await;
            tracing::info!("duplicate operation, skip");
            return ProtocolOutcome::Acked;
        }
        Ok(PendingInsert::Inserted) => {}
        Err(error) => {
            let _ = tx.rollback().await;
            return handle_ledger_error(pool, &write, entity_id, &error.into()).await;
        }
    }

    // Step 5: the domain insert.
    if let Err(error) = handler.insert_domain(&mut tx, entity_id, write.op_type, &write.data).await {
        let _ = tx.rollback().await;
        return handle_domain_error(pool, &write, entity_id, error).await;
    }

    // Step 6: transition to completed, in the same transaction.
    if let Err(error) = ledger::mark_completed(&mut tx, write.operation_id).await {
        let _ = tx.rollback().await;
        return handle_ledger_error(pool, &write, entity_id, &error.into()).await;
    }

    // Step 7: commit.
    if let Err(error) = tx.commit().await {
        return handle_ledger_error(pool, &write, entity_id, &error.into()).await;
    }

    // Step 8: best-effort cache invalidation. Never fatal — CDCC reconciles.
    if let Err(error) = handler.invalidate(cache, write.op_type).await {
        tracing::warn!(?error, operation_id = %write.operation_id, "cache invalidation failed, will be reconciled by CDC");
    }

    ProtocolOutcome::Acked
}

async fn handle_domain_error(
    pool: &PgPool,
    write: &QueuedWrite,
    entity_id: uuid::Uuid,
    error: DomainWriteError,
) -> ProtocolOutcome {
    match error {
        DomainWriteError::Decode { source, .. } => {
            record_failure(pool, write, entity_id, &source.to_string()).await;
            ProtocolOutcome::Acked
        }
        DomainWriteError::Database(db_error) => handle_classified(pool, write, entity_id, &db_error).await,
    }
}

async fn handle_ledger_error(
    pool: &PgPool,
    write: &QueuedWrite,
    entity_id: uuid::Uuid,
    error: &sqlx::Error,
) -> ProtocolOutcome {
    handle_classified(pool, write, entity_id, error).await
}

async fn handle_classified(
    pool: &PgPool,
    write: &QueuedWrite,
    entity_id: uuid::Uuid,
    error: &sqlx::Error,
) -> ProtocolOutcome {
    match classify(error) {
        ErrorClass::Retryable => ProtocolOutcome::Retry(error.to_string()),
        ErrorClass::NonRetryable => {
            record_failure(pool, write, entity_id, &error.to_string()).await;
            ProtocolOutcome::Acked
        }
    }
}

async fn record_failure(pool: &PgPool, write: &QueuedWrite, entity_id: uuid::Uuid, message: &str) {
    if let Err(error) =
        ledger::mark_failed(pool, write.operation_id, write.table, entity_id, write.op_type, message).await
    {
        tracing::error!(?error, operation_id = %write.operation_id, "failed to record ledger failure");
    }
}
