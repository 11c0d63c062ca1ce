use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::owner::OwnerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub i64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatch {
    pub owner_id: OwnerId,
    pub source_name: String,
    pub created_at: DateTime<Utc>,
}

impl NewBatch {
    pub fn now(owner_id: OwnerId, source_name: &str) -> Self {
        NewBatch {
            owner_id,
            source_name: source_name.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// One ingestion invocation. `new_rows` starts at zero and is written once
/// when the batch finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: BatchId,
    pub owner_id: OwnerId,
    pub source_name: String,
    pub created_at: DateTime<Utc>,
    pub new_rows: i64,
}
