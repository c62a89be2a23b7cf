//! Snapshot - ストアとキューの状態を JSON ファイルとして保存・復元
//!
//! ```json
//! { "tables": { "course_modules": [ { "id": 12, "course": 3 } ] },
//!   "jobs": [ { "id": 7, "kind": "course_delete_modules", "payload": { ... },
//!               "next_run_time": "2024-03-01T09:00:00Z", "fail_delay": 120 } ] }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::InMemoryRecordStore;
use crate::domain::JobRecord;
use crate::ports::record_store::Row;
use crate::ports::Clock;
use crate::queue::{InMemoryTaskQueue, RetryPolicy};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cannot access snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Full state of the record store and the task queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<Row>>,
    #[serde(default)]
    pub jobs: Vec<JobRecord>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let text = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SnapshotError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let text = serde_json::to_string_pretty(self).map_err(|source| SnapshotError::Json {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, text + "\n").map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Live in-memory store and queue seeded from this snapshot.
    pub fn restore(
        self,
        clock: Arc<dyn Clock>,
        retry_policy: RetryPolicy,
    ) -> (InMemoryRecordStore, InMemoryTaskQueue) {
        let store = InMemoryRecordStore::with_tables(self.tables);
        let queue = InMemoryTaskQueue::with_jobs(clock, retry_policy, self.jobs);
        (store, queue)
    }

    pub async fn capture(store: &InMemoryRecordStore, queue: &InMemoryTaskQueue) -> Self {
        Self {
            tables: store.tables().await,
            jobs: queue.jobs().await,
        }
    }
}
