use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Indexer sync progress checkpoint.
///
/// Single row holding the last height whose chunk was fully committed.
/// Used to resume after restarts without missing or duplicating data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    pub height: u64,
    pub updated_at: DateTime<Utc>,
}

impl SyncCheckpoint {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            updated_at: Utc::now(),
        }
    }
}
