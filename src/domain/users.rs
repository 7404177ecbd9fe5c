use sqlx::{Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("name must be 1-100 characters")]
    NameLength,
    #[error("email is not a valid address")]
    InvalidEmail,
}

impl CreateUserInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() || self.name.len() > 100 {
            return Err(ValidationError::NameLength);
        }
        if email_address::EmailAddress::is_valid(&self.email) {
            Ok(())
        } else {
            Err(ValidationError::InvalidEmail)
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct UpdateUserInput {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct DeleteUserInput {
    pub user_id: Uuid,
}

/// Inserts the domain row for a `create` write. Runs inside the caller's
/// transaction, never committed or rolled back here.
pub async fn insert_create(
    tx: &mut Transaction<'static, Postgres>,
    entity_id: Uuid,
    input: &CreateUserInput,
) -> Result<(), sqlx::Error> {
    sqlx::query!(
        r#"
        INSERT INTO users (user_id, name, email, created_at)
        VALUES ($1, $2, $3, now())
        "#,
        entity_id,
        input.name,
        input.email,
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn apply_update(
    tx: &mut Transaction<'static, Postgres>,
    entity_id: Uuid,
    input: &UpdateUserInput,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query!(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            email = COALESCE($3, email)
        WHERE user_id = $1
        "#,
        entity_id,
        input.name,
        input.email,
    )
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

pub async fn apply_delete(
    tx: &mut Transaction<'static, Postgres>,
    entity_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query!("DELETE FROM users WHERE user_id = $1", entity_id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}
