//! InMemoryRecordStore - 開発・テスト用のレコードストア
//!
//! # 学習ポイント
//! - テーブル名 → 行のリスト（`BTreeMap<String, Vec<Row>>`）
//! - `fail_reads` / `fail_writes` による障害注入（テスト用）

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::StoreError;
use crate::ports::record_store::{Filter, RecordStore, Row, field_u64, schema};

#[derive(Default)]
struct StoreState {
    tables: BTreeMap<String, Vec<Row>>,
    failing_reads: BTreeSet<String>,
    failing_writes: BTreeSet<String>,
}

impl StoreState {
    fn check_read(&self, table: &str) -> Result<(), StoreError> {
        if self.failing_reads.contains(table) {
            return Err(StoreError::new(table, "read refused"));
        }
        Ok(())
    }

    fn check_write(&self, table: &str) -> Result<(), StoreError> {
        if self.failing_writes.contains(table) {
            return Err(StoreError::new(table, "write refused"));
        }
        Ok(())
    }

    fn next_id(&self, table: &str) -> u64 {
        self.tables
            .get(table)
            .and_then(|rows| rows.iter().filter_map(|r| field_u64(r, schema::ID)).max())
            .map_or(1, |max| max + 1)
    }
}

/// InMemoryRecordStore は開発用のレコードストア
///
/// # 使用例
/// ```ignore
/// let store = InMemoryRecordStore::new();
/// store.seed("course_modules", json!({"id": 12, "course": 3})).await;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding exactly `tables`.
    pub fn with_tables(tables: BTreeMap<String, Vec<Row>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                tables,
                ..StoreState::default()
            })),
        }
    }

    /// Insert a JSON object as a row. Non-objects are ignored.
    pub async fn seed(&self, table: &str, row: Value) {
        if let Value::Object(row) = row {
            let mut state = self.state.lock().await;
            state.tables.entry(table.to_string()).or_default().push(row);
        }
    }

    /// Copy of every table.
    pub async fn tables(&self) -> BTreeMap<String, Vec<Row>> {
        self.state.lock().await.tables.clone()
    }

    /// Rows of one table (empty when the table does not exist).
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        let state = self.state.lock().await;
        state.tables.get(table).cloned().unwrap_or_default()
    }

    /// Make every read of `table` fail.
    pub async fn fail_reads(&self, table: &str) {
        self.state.lock().await.failing_reads.insert(table.to_string());
    }

    /// Make every write (update or delete) of `table` fail.
    pub async fn fail_writes(&self, table: &str) {
        self.state.lock().await.failing_writes.insert(table.to_string());
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn exists(&self, table: &str, filter: &Filter) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        state.check_read(table)?;
        Ok(state
            .tables
            .get(table)
            .is_some_and(|rows| rows.iter().any(|r| filter.matches(r))))
    }

    async fn get(&self, table: &str, filter: &Filter) -> Result<Option<Row>, StoreError> {
        let state = self.state.lock().await;
        state.check_read(table)?;
        Ok(state
            .tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| filter.matches(r)))
            .cloned())
    }

    async fn get_all(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let state = self.state.lock().await;
        state.check_read(table)?;
        Ok(state
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_or_update(&self, table: &str, mut row: Row) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        state.check_write(table)?;
        let id = match field_u64(&row, schema::ID) {
            Some(id) => id,
            None => {
                let id = state.next_id(table);
                row.insert(schema::ID.to_string(), Value::from(id));
                id
            }
        };
        let rows = state.tables.entry(table.to_string()).or_default();
        let by_id = Filter::id(id);
        match rows.iter_mut().find(|r| by_id.matches(r)) {
            // update: 渡されたフィールドだけ上書きする
            Some(existing) => existing.extend(row),
            None => rows.push(row),
        }
        Ok(id)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        state.check_write(table)?;
        let Some(rows) = state.tables.get_mut(table) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| !filter.matches(r));
        Ok(rows.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn get_returns_first_match() {
        let store = InMemoryRecordStore::new();
        store.seed("context", json!({"id": 1, "contextlevel": 70, "instanceid": 5})).await;
        store.seed("context", json!({"id": 2, "contextlevel": 50, "instanceid": 5})).await;

        let row = store
            .get("context", &Filter::new().eq("instanceid", 5).eq("contextlevel", 50))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["id"], 2);
        assert!(store.get("missing_table", &Filter::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_update_merges_fields() {
        let store = InMemoryRecordStore::new();
        let id = store
            .insert_or_update("course_modules", obj(json!({"course": 3})))
            .await
            .unwrap();
        assert_eq!(id, 1);

        store
            .insert_or_update("course_modules", obj(json!({"id": 1, "deletioninprogress": 1})))
            .await
            .unwrap();
        let rows = store.rows("course_modules").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["course"], 3);
        assert_eq!(rows[0]["deletioninprogress"], 1);
    }

    #[tokio::test]
    async fn delete_reports_whether_rows_were_removed() {
        let store = InMemoryRecordStore::new();
        store.seed("files", json!({"id": 1, "contextid": 9})).await;
        store.seed("files", json!({"id": 2, "contextid": 9})).await;

        assert!(store.delete("files", &Filter::new().eq("contextid", 9)).await.unwrap());
        assert!(!store.delete("files", &Filter::new().eq("contextid", 9)).await.unwrap());
        assert!(!store.delete("nothing", &Filter::new()).await.unwrap());
    }

    #[tokio::test]
    async fn injected_failures_are_errors_not_absence() {
        let store = InMemoryRecordStore::new();
        store.fail_reads("context").await;
        store.fail_writes("files").await;

        assert!(store.exists("context", &Filter::new()).await.is_err());
        assert!(store.delete("files", &Filter::new()).await.is_err());
        assert!(store.exists("files", &Filter::new()).await.is_ok());
    }
}
