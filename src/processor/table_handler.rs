use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::cache::{CacheKeystore, Namespace};
use crate::domain::{orders, users, EntityTable, OpType};

/// Step 5 failed, either because the payload didn't deserialize into the
/// shape this table/op_type expects, or because the insert/update/delete
/// itself errored. Decode failures are always non-retryable: no number of
/// retries turns malformed JSON into a valid `CreateOrderInput`.
#[derive(Debug, thiserror::Error)]
pub enum DomainWriteError {
    #[error("payload did not match the schema for {table}/{op_type:?}: {source}")]
    Decode {
        table: EntityTable,
        op_type: OpType,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Per-table capability set: which table it handles, how to apply a write
/// to the domain table, and which cache namespace(s) a successful write
/// invalidates. A tagged variant rather than a trait object hierarchy — the
/// write protocol in `processor::protocol` is a free function parameterized
/// by this value, not a method on it.
#[derive(Debug, Clone, Copy)]
pub enum TableHandler {
    Users,
    Orders,
}

impl TableHandler {
    #[must_use]
    pub const fn for_table(table: EntityTable) -> Self {
        match table {
            EntityTable::Users => Self::Users,
            EntityTable::Orders => Self::Orders,
        }
    }

    #[must_use]
    pub const fn table(self) -> EntityTable {
        match self {
            Self::Users => EntityTable::Users,
            Self::Orders => EntityTable::Orders,
        }
    }

    /// Step 2 of the write protocol: the row `data` addresses. `Create`
    /// mints a fresh id for the row it's about to insert; `Update`/`Delete`
    /// target a row the caller already knows, so the id comes out of `data`
    /// itself (`user_id`/`order_id`) rather than being generated here.
    pub fn resolve_entity_id(self, op_type: OpType, data: &serde_json::Value) -> Result<Uuid, DomainWriteError> {
        if matches!(op_type, OpType::Create) {
            return Ok(Uuid::new_v4());
        }
        match self {
            Self::Users => match op_type {
                OpType::Update => decode::<users::UpdateUserInput>(EntityTable::Users, op_type, data)
                    .map(|input| input.user_id),
                OpType::Delete => decode::<users::DeleteUserInput>(EntityTable::Users, op_type, data)
                    .map(|input| input.user_id),
                OpType::Create => unreachable!(),
            },
            Self::Orders => match op_type {
                OpType::Update => decode::<orders::UpdateOrderInput>(EntityTable::Orders, op_type, data)
                    .map(|input| input.order_id),
                OpType::Delete => decode::<orders::DeleteOrderInput>(EntityTable::Orders, op_type, data)
                    .map(|input| input.order_id),
                OpType::Create => unreachable!(),
            },
        }
    }

    /// Step 5 of the write protocol: apply `data` to the domain table under
    /// `entity_id`, inside the caller's transaction.
    pub async fn insert_domain(
        self,
        tx: &mut Transaction<'static, Postgres>,
        entity_id: Uuid,
        op_type: OpType,
        data: &serde_json::Value,
    ) -> Result<(), DomainWriteError> {
        match self {
            Self::Users => apply_users(tx, entity_id, op_type, data).await,
            Self::Orders => apply_orders(tx, entity_id, op_type, data).await,
        }
    }

    /// Step 8: the namespace(s) to invalidate after a committed write.
    /// `orders` carries no cross-table fan-out; deleting a `users` row does,
    /// since dependent order views become stale too (see `processor::protocol`).
    #[must_use]
    pub const fn own_namespace(self) -> Namespace {
        match self {
            Self::Users => Namespace::Users,
            Self::Orders => Namespace::Orders,
        }
    }

    pub async fn invalidate(self, cache: &CacheKeystore, op_type: OpType) -> Result<(), redis::RedisError> {
        cache.invalidate_namespace(self.own_namespace()).await?;
        if matches!(self, Self::Users) && op_type == OpType::Delete {
            // FK cascade semantics: a deleted user invalidates dependent order views too.
            cache.invalidate_namespace(Namespace::Orders).await?;
        }
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    table: EntityTable,
    op_type: OpType,
    data: &serde_json::Value,
) -> Result<T, DomainWriteError> {
    serde_json::from_value(data.clone()).map_err(|source| DomainWriteError::Decode {
        table,
        op_type,
        source,
    })
}

async fn apply_users(
    tx: &mut Transaction<'static, Postgres>,
    entity_id: Uuid,
    op_type: OpType,
    data: &serde_json::Value,
) -> Result<(), DomainWriteError> {
    match op_type {
        OpType::Create => {
            let input: users::CreateUserInput = decode(EntityTable::Users, op_type, data)?;
            users::insert_create(tx, entity_id, &input).await?;
        }
        OpType::Update => {
            let input: users::UpdateUserInput = decode(EntityTable::Users, op_type, data)?;
            users::apply_update(tx, entity_id, &input).await?;
        }
        OpType::Delete => {
            users::apply_delete(tx, entity_id).await?;
        }
    }
    Ok(())
}

async fn apply_orders(
    tx: &mut Transaction<'static, Postgres>,
    entity_id: Uuid,
    op_type: OpType,
    data: &serde_json::Value,
) -> Result<(), DomainWriteError> {
    match op_type {
        OpType::Create => {
            let input: orders::CreateOrderInput = decode(EntityTable::Orders, op_type, data)?;
            orders::insert_create(tx, entity_id, &input).await?;
        }
        OpType::Update => {
            let input: orders::UpdateOrderInput = decode(EntityTable::Orders, op_type, data)?;
            orders::apply_update(tx, entity_id, &input).await?;
        }
        OpType::Delete => {
            orders::apply_delete(tx, entity_id).await?;
        }
    }
    Ok(())
}
