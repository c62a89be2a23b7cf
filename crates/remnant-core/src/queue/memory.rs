//! In-memory task queue implementation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::RetryPolicy;
use crate::domain::{JobRecord, QueueError, TaskId};
use crate::ports::{Clock, TaskQueue};

/// In-memory queue state.
struct InMemoryTaskQueueState {
    /// All jobs, keyed (and therefore ordered) by id.
    jobs: BTreeMap<TaskId, JobRecord>,

    /// Next job id to assign.
    next_id: u64,

    retry_policy: RetryPolicy,
}

impl InMemoryTaskQueueState {
    fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            jobs: BTreeMap::new(),
            next_id: 1,
            retry_policy,
        }
    }

    fn allocate_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert(&mut self, mut job: JobRecord) -> TaskId {
        let id = match job.id {
            // 既存 id を尊重しつつ、以後の採番と衝突しないようにする
            Some(id) if !self.jobs.contains_key(&id) => {
                self.next_id = self.next_id.max(id.get() + 1);
                id
            }
            _ => self.allocate_id(),
        };
        job.id = Some(id);
        self.jobs.insert(id, job);
        id
    }
}

/// In-memory implementation of the `TaskQueue` port.
///
/// Design:
/// - `BTreeMap` so listings come back in id order without sorting.
/// - `mark_failed` grows `fail_delay` through the `RetryPolicy` and pushes
///   `next_run_time` from the injected `Clock`.
pub struct InMemoryTaskQueue {
    state: Arc<Mutex<InMemoryTaskQueueState>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskQueue {
    pub fn new(clock: Arc<dyn Clock>, retry_policy: RetryPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryTaskQueueState::new(retry_policy))),
            clock,
        }
    }

    /// Queue pre-filled with `jobs` (ids kept when present).
    pub fn with_jobs(
        clock: Arc<dyn Clock>,
        retry_policy: RetryPolicy,
        jobs: impl IntoIterator<Item = JobRecord>,
    ) -> Self {
        let mut state = InMemoryTaskQueueState::new(retry_policy);
        for job in jobs {
            state.insert(job);
        }
        Self {
            state: Arc::new(Mutex::new(state)),
            clock,
        }
    }

    /// Every job currently queued, in id order.
    pub async fn jobs(&self) -> Vec<JobRecord> {
        let state = self.state.lock().await;
        state.jobs.values().cloned().collect()
    }

    pub async fn get(&self, id: TaskId) -> Option<JobRecord> {
        let state = self.state.lock().await;
        state.jobs.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn job_id(job: &JobRecord) -> Result<TaskId, QueueError> {
    job.id
        .ok_or_else(|| QueueError("job has not been enqueued".to_string()))
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn list_jobs(
        &self,
        kind: &str,
        ids: Option<&[TaskId]>,
        min_fail_delay: Option<u64>,
    ) -> Result<Vec<JobRecord>, QueueError> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .iter()
            .filter(|(_, job)| job.kind == kind)
            .filter(|(id, _)| ids.is_none_or(|ids| ids.contains(id)))
            .filter(|(_, job)| min_fail_delay.is_none_or(|min| job.fail_delay >= min))
            .map(|(_, job)| job.clone())
            .collect())
    }

    async fn next_job(&self, before: DateTime<Utc>) -> Result<Option<JobRecord>, QueueError> {
        let mut state = self.state.lock().await;
        let next = state
            .jobs
            .values_mut()
            .filter(|job| !job.locked && job.next_run_time <= before)
            .min_by_key(|job| (job.next_run_time, job.id));
        Ok(next.map(|job| {
            job.locked = true;
            job.clone()
        }))
    }

    async fn enqueue(&self, mut job: JobRecord) -> Result<TaskId, QueueError> {
        job.id = None;
        job.locked = false;
        let mut state = self.state.lock().await;
        Ok(state.insert(job))
    }

    async fn reschedule_or_enqueue(&self, job: JobRecord) -> Result<TaskId, QueueError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.jobs.values_mut().find(|j| j.is_equivalent(&job)) {
            existing.next_run_time = job.next_run_time;
            existing.fail_delay = job.fail_delay;
            return job_id(existing);
        }
        let mut job = job;
        job.id = None;
        job.locked = false;
        Ok(state.insert(job))
    }

    async fn delete_job(&self, id: TaskId) -> Result<bool, QueueError> {
        let mut state = self.state.lock().await;
        Ok(state.jobs.remove(&id).is_some())
    }

    async fn mark_complete(&self, job: &JobRecord) -> Result<(), QueueError> {
        let id = job_id(job)?;
        let mut state = self.state.lock().await;
        state.jobs.remove(&id);
        Ok(())
    }

    async fn mark_failed(&self, job: &JobRecord) -> Result<(), QueueError> {
        let id = job_id(job)?;
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let policy = state.retry_policy.clone();
        let Some(stored) = state.jobs.get_mut(&id) else {
            return Err(QueueError(format!("{id} is not queued")));
        };
        let delay = policy.next_delay(Duration::from_secs(stored.fail_delay));
        stored.fail_delay = delay.as_secs();
        stored.next_run_time = now + chrono::Duration::seconds(delay.as_secs() as i64);
        stored.locked = false;
        Ok(())
    }
}
