use sqlx::{Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct CreateOrderInput {
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub description: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("amount_cents must be positive")]
    NonPositiveAmount,
    #[error("description must be 1-500 characters")]
    DescriptionLength,
}

impl CreateOrderInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.amount_cents <= 0 {
            return Err(ValidationError::NonPositiveAmount);
        }
        if self.description.is_empty() || self.description.len() > 500 {
            return Err(ValidationError::DescriptionLength);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct UpdateOrderInput {
    pub order_id: Uuid,
    pub amount_cents: Option<i64>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct DeleteOrderInput {
    pub order_id: Uuid,
}

/// Inserts the domain row for a `create` write. The FK to `users` is what
/// makes this table's non-retryable-error path exercisable end to end: a
/// nonexistent `user_id` trips `foreign_key_violation`.
pub async fn insert_create(
    tx: &mut Transaction<'static, Postgres>,
    entity_id: Uuid,
    input: &CreateOrderInput,
) -> Result<(), sqlx::Error> {
    sqlx::query!(
        r#"
        INSERT INTO orders (order_id, user_id, amount_cents, description, created_at)
        VALUES ($1, $2, $3, $4, now())
        "#,
        entity_id,
        input.user_id,
        input.amount_cents,
        input.description,
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn apply_update(
    tx: &mut Transaction<'static, Postgres>,
    entity_id: Uuid,
    input: &UpdateOrderInput,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query!(
        r#"
        UPDATE orders
        SET amount_cents = COALESCE($2, amount_cents)
        WHERE order_id = $1
        "#,
        entity_id,
        input.amount_cents,
    )
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

pub async fn apply_delete(
    tx: &mut Transaction<'static, Postgres>,
    entity_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query!("DELETE FROM orders WHERE order_id = $1", entity_id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}
