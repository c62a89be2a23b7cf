//! RecordStore port - 外部のレコードストア（テーブル名 + 等値フィルタ）
//!
//! 行は `serde_json::Map` のまま扱います。型付けは呼び出し側（catalog, diagnoser,
//! surgeon）が境界で行います。
//!
//! # 設計原則
//! - 読み取りの失敗は `StoreError`（「存在しない」とは区別する）
//! - `delete` は 1 行以上消えたときだけ `true`

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::StoreError;

/// One stored row.
pub type Row = serde_json::Map<String, Value>;

/// Conjunction of `field == value` conditions. Empty matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `id == value`
    pub fn id(value: u64) -> Self {
        Self::new().eq(schema::ID, value)
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| row.get(field).is_some_and(|v| same_value(v, value)))
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }
}

// 1 と 1.0、"1" と 1 は別物として扱う。数値だけは u64/i64 の違いを吸収する
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Read a numeric column.
pub fn field_u64(row: &Row, field: &str) -> Option<u64> {
    row.get(field).and_then(Value::as_u64)
}

/// Read a string column.
pub fn field_str<'a>(row: &'a Row, field: &str) -> Option<&'a str> {
    row.get(field).and_then(Value::as_str)
}

/// RecordStore は外部ストアへのインターフェース
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn exists(&self, table: &str, filter: &Filter) -> Result<bool, StoreError>;

    /// First matching row.
    async fn get(&self, table: &str, filter: &Filter) -> Result<Option<Row>, StoreError>;

    async fn get_all(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError>;

    /// Update the row with the same `id`, or insert it (assigning an `id`
    /// when it has none). Returns the row id.
    async fn insert_or_update(&self, table: &str, row: Row) -> Result<u64, StoreError>;

    /// Returns `true` when at least one row was removed.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<bool, StoreError>;
}

/// Table and column names of the store this engine repairs.
pub mod schema {
    pub const ID: &str = "id";

    /// Generic dependent-entity table (one row per target).
    pub const TARGETS: &str = "course_modules";
    pub const TARGET_CONTAINER: &str = "course";
    pub const TARGET_KIND: &str = "module";
    pub const TARGET_INSTANCE: &str = "instance";
    pub const TARGET_PLACEMENT: &str = "section";
    pub const TARGET_DELETION_IN_PROGRESS: &str = "deletioninprogress";

    /// Kind catalog: `id`, `name`. The name doubles as the kind-specific table name.
    pub const KINDS: &str = "modules";
    pub const KIND_NAME: &str = "name";

    pub const CONTAINERS: &str = "course";
    pub const CONTAINER_CACHE_REV: &str = "cacherev";

    /// Access scopes: `contextlevel` + `instanceid`.
    pub const SCOPES: &str = "context";
    pub const SCOPE_LEVEL: &str = "contextlevel";
    pub const SCOPE_INSTANCE: &str = "instanceid";

    /// Placements: `course`, `sequence` (array of target ids).
    pub const PLACEMENTS: &str = "course_sections";
    pub const PLACEMENT_SEQUENCE: &str = "sequence";

    pub const EVENTS: &str = "event";
    pub const EVENT_INSTANCE: &str = "instance";
    pub const EVENT_KIND: &str = "modulename";
    pub const EVENT_SCOPE: &str = "contextid";

    pub const SCORING_ITEMS: &str = "grade_items";
    pub const SCORING_TYPE: &str = "itemtype";
    pub const SCORING_KIND: &str = "itemmodule";
    pub const SCORING_INSTANCE: &str = "iteminstance";
    pub const SCORING_CONTAINER: &str = "courseid";
    pub const SCORING_GRADES: &str = "grade_grades";
    pub const SCORING_GRADE_ITEM: &str = "itemid";

    pub const ARTIFACTS: &str = "files";
    pub const ASSOCIATIONS: &str = "blog_association";
    pub const SCOPE_REF: &str = "contextid";

    pub const COMPLETION: &str = "course_modules_completion";
    pub const COMPLETION_TARGET: &str = "coursemoduleid";
    pub const COMPLETION_CRITERIA: &str = "course_completion_criteria";
    pub const CRITERIA_TARGET: &str = "moduleinstance";
    pub const CRITERIA_CONTAINER: &str = "course";
    pub const CRITERIA_TYPE: &str = "criteriatype";

    pub const TAG_INSTANCES: &str = "tag_instance";
    pub const TAG_COMPONENT: &str = "component";
    pub const TAG_ITEM_TYPE: &str = "itemtype";
    pub const TAG_ITEM_ID: &str = "itemid";

    pub const COMPETENCY_LINKS: &str = "competency_modulecomp";
    pub const COMPETENCY_TARGET: &str = "cmid";

    pub const MODULE_INFO_CACHE: &str = "module_info_cache";
    pub const CACHE_CONTAINER: &str = "course";
    pub const CACHE_TARGET: &str = "cmid";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&row(json!({"id": 1}))));
    }

    #[test]
    fn filter_is_a_conjunction() {
        let r = row(json!({"contextlevel": 70, "instanceid": 12}));
        assert!(Filter::new().eq("contextlevel", 70).eq("instanceid", 12u64).matches(&r));
        assert!(!Filter::new().eq("contextlevel", 70).eq("instanceid", 13).matches(&r));
        assert!(!Filter::new().eq("missing", 1).matches(&r));
    }

    #[test]
    fn numbers_compare_across_signedness_but_not_with_strings() {
        let r = row(json!({"id": 5}));
        assert!(Filter::id(5).matches(&r));
        assert!(Filter::new().eq("id", 5i64).matches(&r));
        assert!(!Filter::new().eq("id", "5").matches(&r));
    }
}
