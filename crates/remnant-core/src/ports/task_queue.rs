//! TaskQueue port - 外部のジョブキュー
//!
//! このエンジンはキューを「使う」だけで、実行はしません。
//! 実装: `queue::InMemoryTaskQueue`（開発・テスト・CLI のスナップショット用）

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{JobRecord, QueueError, TaskId};

/// TaskQueue は削除ジョブを保持するキュー
///
/// # 設計原則
/// - `list_jobs` は読み取り専用
/// - `reschedule_or_enqueue` は actor + kind + payload が一致するジョブを探し、
///   あれば next_run_time / fail_delay を更新、なければ新規投入
/// - `delete_job` はジョブが存在して消えたときだけ `true`
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Jobs of `kind`, optionally restricted to `ids` and to jobs whose
    /// `fail_delay` is at least `min_fail_delay` seconds. Ordered by id.
    async fn list_jobs(
        &self,
        kind: &str,
        ids: Option<&[TaskId]>,
        min_fail_delay: Option<u64>,
    ) -> Result<Vec<JobRecord>, QueueError>;

    /// Earliest unlocked job due before `before`; the job is locked.
    async fn next_job(&self, before: DateTime<Utc>) -> Result<Option<JobRecord>, QueueError>;

    async fn enqueue(&self, job: JobRecord) -> Result<TaskId, QueueError>;

    async fn reschedule_or_enqueue(&self, job: JobRecord) -> Result<TaskId, QueueError>;

    async fn delete_job(&self, id: TaskId) -> Result<bool, QueueError>;

    /// Remove a job a runner finished.
    async fn mark_complete(&self, job: &JobRecord) -> Result<(), QueueError>;

    /// Unlock a job a runner failed and push it back with a longer delay.
    async fn mark_failed(&self, job: &JobRecord) -> Result<(), QueueError>;
}
