//! TaskCatalog - キューから削除タスクを読み出して DeleteTask に変換
//!
//! # 設計原則
//! - キューに対しては読み取り専用
//! - payload の値を優先し、足りない値だけ生きている対象レコードから補う
//! - 壊れたジョブ（decode 失敗・対象 0 件）はログに残してスキップ
//! - id の無い対象エントリは捨てずにタスクに残す（診断で症状として報告する）
//! - ストアの読み取り失敗は「存在しない」とは扱わず、そのまま返す

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::config::RepairConfig;
use crate::domain::{
    ContainerId, DeletePayload, DeleteTask, InstanceId, JobRecord, KindId, PlacementId, QueueError,
    RemnantError, StoreError, TargetDescriptor, TargetEntry, TaskId,
};
use crate::ports::record_store::{Filter, RecordStore, field_str, field_u64, schema};
use crate::ports::TaskQueue;

/// Which queue jobs to load.
///
/// `ids == None` means every job of the configured kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub ids: Option<Vec<TaskId>>,
    /// Seconds; only jobs that already backed off at least this far.
    pub minimum_fail_delay: Option<u64>,
}

impl TaskFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn ids(ids: impl IntoIterator<Item = TaskId>) -> Self {
        Self {
            ids: Some(ids.into_iter().collect()),
            minimum_fail_delay: None,
        }
    }

    pub fn with_minimum_fail_delay(mut self, seconds: u64) -> Self {
        self.minimum_fail_delay = Some(seconds);
        self
    }
}

/// Fills a `TargetDescriptor` from a payload entry and the live store.
#[derive(Clone)]
pub struct TargetResolver {
    store: Arc<dyn RecordStore>,
}

impl TargetResolver {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, entry: &TargetEntry) -> Result<Option<TargetDescriptor>, StoreError> {
        let Some(target_id) = entry.id else {
            return Ok(None);
        };
        let mut descriptor = TargetDescriptor::unresolved(target_id);
        descriptor.container_id = entry.container;
        descriptor.kind_id = entry.kind;
        descriptor.instance_id = entry.instance;
        descriptor.placement_id = entry.placement;

        let live = self
            .store
            .get(schema::TARGETS, &Filter::id(target_id.get()))
            .await?;
        if let Some(row) = &live {
            descriptor.found_in_store = true;
            descriptor.container_id = descriptor
                .container_id
                .or_else(|| field_u64(row, schema::TARGET_CONTAINER).map(ContainerId::new));
            descriptor.kind_id = descriptor
                .kind_id
                .or_else(|| field_u64(row, schema::TARGET_KIND).map(KindId::new));
            descriptor.instance_id = descriptor
                .instance_id
                .or_else(|| field_u64(row, schema::TARGET_INSTANCE).map(InstanceId::new));
            descriptor.placement_id = descriptor
                .placement_id
                .or_else(|| field_u64(row, schema::TARGET_PLACEMENT).map(PlacementId::new));
        }

        if let Some(kind_id) = descriptor.kind_id {
            descriptor.kind_name = self.kind_name(kind_id).await?;
        }
        debug!(%target_id, found = descriptor.found_in_store, kind = ?descriptor.kind_name, "target resolved");
        Ok(Some(descriptor))
    }

    /// Kind name from the kinds catalog.
    pub async fn kind_name(&self, kind_id: KindId) -> Result<Option<String>, StoreError> {
        let row = self
            .store
            .get(schema::KINDS, &Filter::id(kind_id.get()))
            .await?;
        Ok(row
            .as_ref()
            .and_then(|r| field_str(r, schema::KIND_NAME))
            .map(str::to_string))
    }
}

/// TaskCatalog は削除タスクの一覧を提供
pub struct TaskCatalog {
    queue: Arc<dyn TaskQueue>,
    resolver: TargetResolver,
    config: RepairConfig,
}

impl TaskCatalog {
    pub fn new(queue: Arc<dyn TaskQueue>, store: Arc<dyn RecordStore>, config: RepairConfig) -> Self {
        Self {
            queue,
            resolver: TargetResolver::new(store),
            config,
        }
    }

    /// Matching tasks keyed by id. Broken jobs are skipped.
    pub async fn load(&self, filter: &TaskFilter) -> Result<BTreeMap<TaskId, DeleteTask>, RemnantError> {
        let jobs = self
            .queue
            .list_jobs(
                &self.config.task_kind,
                filter.ids.as_deref(),
                filter.minimum_fail_delay,
            )
            .await?;

        let mut tasks = BTreeMap::new();
        for job in jobs {
            match self.decode(&job).await {
                Ok(task) => {
                    tasks.insert(task.task_id(), task);
                }
                Err(error @ RemnantError::Store(_)) => return Err(error),
                Err(error) => warn!(job = ?job.id, %error, "skipping undecodable task"),
            }
        }
        debug!(count = tasks.len(), "tasks loaded");
        Ok(tasks)
    }

    /// One task by id.
    pub async fn get(&self, task_id: TaskId) -> Result<DeleteTask, RemnantError> {
        self.load(&TaskFilter::ids([task_id]))
            .await?
            .remove(&task_id)
            .ok_or(RemnantError::TaskNotFound(task_id))
    }

    async fn decode(&self, job: &JobRecord) -> Result<DeleteTask, RemnantError> {
        let Some(task_id) = job.id else {
            return Err(QueueError("listed job without id".to_string()).into());
        };
        let payload = DeletePayload::decode(task_id, &job.payload)?;
        let mut targets = Vec::with_capacity(payload.targets.len());
        let mut unidentified = Vec::new();
        for entry in payload.targets.entries() {
            match self.resolver.resolve(entry).await? {
                Some(descriptor) => targets.push(descriptor),
                None => {
                    debug!(%task_id, ?entry, "target entry without id");
                    unidentified.push(entry.clone());
                }
            }
        }
        let actor = job.actor_id.or(payload.actor_id);
        DeleteTask::from_parts(task_id, job.payload.clone(), actor, targets, unidentified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActorId, TargetId};
    use crate::impls::InMemoryRecordStore;
    use crate::ports::FixedClock;
    use crate::queue::{InMemoryTaskQueue, RetryPolicy};
    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};

    struct Fixture {
        store: InMemoryRecordStore,
        queue: Arc<InMemoryTaskQueue>,
        catalog: TaskCatalog,
    }

    fn fixture() -> Fixture {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let store = InMemoryRecordStore::new();
        let queue = Arc::new(InMemoryTaskQueue::new(
            Arc::new(FixedClock::new(now)),
            RetryPolicy::standard(),
        ));
        let catalog = TaskCatalog::new(queue.clone(), Arc::new(store.clone()), RepairConfig::default());
        Fixture {
            store,
            queue,
            catalog,
        }
    }

    async fn enqueue(queue: &InMemoryTaskQueue, payload: Value) -> TaskId {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        queue
            .enqueue(JobRecord::new("course_delete_modules", Some(ActorId::new(2)), payload, at))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn payload_values_win_and_live_record_fills_gaps() {
        let f = fixture();
        f.store
            .seed(
                "course_modules",
                json!({"id": 12, "course": 3, "module": 5, "instance": 40, "section": 8}),
            )
            .await;
        f.store.seed("modules", json!({"id": 5, "name": "page"})).await;
        let id = enqueue(&f.queue, json!({"targets": [{"id": 12, "instance": 41}]})).await;

        let task = f.catalog.get(id).await.unwrap();
        let target = task.first_target().unwrap();

        assert!(target.found_in_store);
        assert_eq!(target.instance_id, Some(InstanceId::new(41)));
        assert_eq!(target.container_id, Some(ContainerId::new(3)));
        assert_eq!(target.placement_id, Some(PlacementId::new(8)));
        assert_eq!(target.kind_name.as_deref(), Some("page"));
    }

    #[tokio::test]
    async fn unresolvable_kind_leaves_name_empty() {
        let f = fixture();
        let id = enqueue(&f.queue, json!({"targets": [{"id": 12, "kind": 99}]})).await;

        let task = f.catalog.get(id).await.unwrap();
        let target = task.first_target().unwrap();

        assert!(!target.found_in_store);
        assert_eq!(target.kind_name, None);
    }

    #[tokio::test]
    async fn broken_jobs_are_skipped() {
        let f = fixture();
        let good = enqueue(&f.queue, json!({"targets": [{"id": 12}]})).await;
        enqueue(&f.queue, json!({"targets": []})).await;
        enqueue(&f.queue, json!("garbage")).await;

        let tasks = f.catalog.load(&TaskFilter::all()).await.unwrap();

        assert_eq!(tasks.keys().copied().collect::<Vec<_>>(), vec![good]);
    }

    #[tokio::test]
    async fn entries_without_id_are_kept_on_the_task() {
        let f = fixture();
        let id = enqueue(&f.queue, json!({"targets": [{"container": 3}]})).await;

        let task = f.catalog.get(id).await.unwrap();

        assert!(task.first_target().is_none());
        assert_eq!(task.unidentified().len(), 1);
        assert_eq!(task.unidentified()[0].container, Some(ContainerId::new(3)));
        assert!(!task.is_multi_target());
    }

    #[tokio::test]
    async fn filter_restricts_ids_and_fail_delay() {
        let f = fixture();
        let a = enqueue(&f.queue, json!({"targets": [{"id": 1}]})).await;
        let b = enqueue(&f.queue, json!({"targets": [{"id": 2}]})).await;
        let failed = f.queue.get(b).await.unwrap();
        f.queue.mark_failed(&failed).await.unwrap();

        let only_a = f.catalog.load(&TaskFilter::ids([a])).await.unwrap();
        assert_eq!(only_a.len(), 1);

        let slow = f
            .catalog
            .load(&TaskFilter::all().with_minimum_fail_delay(60))
            .await
            .unwrap();
        assert_eq!(slow.keys().copied().collect::<Vec<_>>(), vec![b]);
    }

    #[tokio::test]
    async fn missing_task_is_not_found() {
        let f = fixture();
        let err = f.catalog.get(TaskId::new(404)).await.unwrap_err();
        assert!(matches!(err, RemnantError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn store_failure_is_not_absence() {
        let f = fixture();
        enqueue(&f.queue, json!({"targets": [{"id": 12}]})).await;
        f.store.fail_reads("course_modules").await;

        let err = f.catalog.load(&TaskFilter::all()).await.unwrap_err();
        assert!(matches!(err, RemnantError::Store(_)));
    }

    #[tokio::test]
    async fn keyed_payload_keeps_target_order() {
        let f = fixture();
        let id = enqueue(&f.queue, json!({"targets": {"31": {}, "30": {}}})).await;

        let task = f.catalog.get(id).await.unwrap();

        assert_eq!(task.target_ids(), vec![TargetId::new(31), TargetId::new(30)]);
    }
}
