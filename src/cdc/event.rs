use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::EntityTable;

/// The four operation codes a logical-replication derived CDC feed can
/// report. `r` (initial snapshot read) carries no write semantics at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CdcOp {
    C,
    U,
    D,
    R,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CdcEvent {
    pub op: CdcOp,
    pub table: EntityTableField,
    pub primary_key_columns: HashMap<String, serde_json::Value>,
    pub source_timestamp: DateTime<Utc>,
}

/// `table` arrives as free text on the wire; wrapping the parse here keeps
/// an event with an unrecognized table name a deserialize-time concern
/// instead of a runtime `unwrap`.
#[derive(Debug, Clone, Copy)]
pub struct EntityTableField(pub EntityTable);

impl<'de> serde::Deserialize<'de> for EntityTableField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<EntityTable>()
            .map(EntityTableField)
            .map_err(serde::de::Error::custom)
    }
}
