mod sweeper;

pub use sweeper::run_sweeper;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{EntityTable, OpType};

/// `write_operations.status`. Once a row leaves `Pending` it is terminal —
/// nothing in this module offers a way to transition out of `Completed` or
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct WriteOperationRow {
    pub operation_id: Uuid,
    pub entity_table: EntityTable,
    pub entity_id: Uuid,
    pub op_type: OpType,
    pub status: OperationStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Whether the pending-insert in step 4 of the write protocol planted a new
/// row (first delivery) or hit the unique constraint on `operation_id`
/// (a redelivery or a duplicate client submission beyond the queue's own
/// dedup window).
pub enum PendingInsert {
    Inserted,
    AlreadyExists,
}

const UNIQUE_VIOLATION: &str = "23505";

/// Step 4 of the write protocol: the idempotency pivot. Runs inside `tx`;
/// the caller rolls back on `AlreadyExists` and commits on `Inserted` once
/// the domain row and status transition also succeed.
pub async fn try_insert_pending(
    tx: &mut Transaction<'static, Postgres>,
    operation_id: Uuid,
    entity_table: EntityTable,
    entity_id: Uuid,
    op_type: OpType,
) -> Result<PendingInsert, sqlx::Error> {
    let result = sqlx::query!(
        r#"
        INSERT INTO write_operations (operation_id, entity_table, entity_id, op_type, status, created_at)
        VALUES ($1, $2, $3, $4, 'pending', now())
        "#,
        operation_id,
        entity_table.as_str(),
        entity_id,
        op_type.as_str(),
    )
    .execute(&mut **tx)
    .await;

    match result {
        Ok(_) => Ok(PendingInsert::Inserted),
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            Ok(PendingInsert::AlreadyExists)
        }
        Err(other) => Err(other),
    }
}

/// Step 6 of the write protocol, in the same transaction as the domain insert.
pub async fn mark_completed(
    tx: &mut Transaction<'static, Postgres>,
    operation_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query!(
        r#"
        UPDATE write_operations
        SET status = 'completed', completed_at = now()
        WHERE operation_id = $1
        "#,
        operation_id,
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Records a non-retryable failure in a standalone statement after the
/// write transaction has already rolled back. Uses `ON CONFLICT DO UPDATE`
/// rather than a plain `UPDATE` because the pending row it would otherwise
/// target was rolled back along with everything else in the failed
/// transaction.
pub async fn mark_failed(
    pool: &PgPool,
    operation_id: Uuid,
    entity_table: EntityTable,
    entity_id: Uuid,
    op_type: OpType,
    error: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query!(
        r#"
        INSERT INTO write_operations (operation_id, entity_table, entity_id, op_type, status, error, created_at, completed_at)
        VALUES ($1, $2, $3, $4, 'failed', $5, now(), now())
        ON CONFLICT (operation_id) DO UPDATE
        SET status = 'failed', error = EXCLUDED.error, completed_at = now()
        WHERE write_operations.status = 'pending'
        "#,
        operation_id,
        entity_table.as_str(),
        entity_id,
        op_type.as_str(),
        error,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch(pool: &PgPool, operation_id: Uuid) -> Result<Option<WriteOperationRow>, sqlx::Error> {
    sqlx::query_as!(
        WriteOperationRow,
        r#"
        SELECT
            operation_id,
            entity_table as "entity_table: EntityTable",
            entity_id,
            op_type as "op_type: OpType",
            status as "status: OperationStatus",
            error,
            created_at,
            completed_at
        FROM write_operations
        WHERE operation_id = $1
        "#,
        operation_id,
    )
    .fetch_optional(pool)
    .await
}
