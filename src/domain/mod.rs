pub mod orders;
pub mod users;

use std::fmt;
use std::str::FromStr;

/// The tables this pipeline accepts writes for. Adding a new table means
/// adding a variant here, a module under `domain/`, and a `TableHandler`
/// entry in `processor::table_handler` — nothing else dispatches on table
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntityTable {
    Users,
    Orders,
}

impl EntityTable {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Orders => "orders",
        }
    }

    /// The subject suffix this table's writes are routed to, e.g. `writes.users`.
    #[must_use]
    pub fn writes_subject(self, stream_prefix: &str) -> String {
        format!("{stream_prefix}.{}", self.as_str())
    }
}

impl fmt::Display for EntityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported table: {0}")]
pub struct UnsupportedTable(String);

impl FromStr for EntityTable {
    type Err = UnsupportedTable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "users" => Ok(Self::Users),
            "orders" => Ok(Self::Orders),
            other => Err(UnsupportedTable(other.to_string())),
        }
    }
}

/// `op_type` on both the wire request and the ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    Create,
    Update,
    Delete,
}

impl OpType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// The decoded body of a message sitting on `writes.<table>`. `table` is
/// carried alongside `data` even though the subject already implies it,
/// since the ledger row records it independently of routing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueuedWrite {
    pub operation_id: uuid::Uuid,
    pub table: EntityTable,
    pub op_type: OpType,
    pub data: serde_json::Value,
}
