//! Job record: one row of the external task queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ActorId, TaskId};

/// A queued job as the task queue stores it.
///
/// Design:
/// - The queue owns persistence; this is a plain copy of its row.
/// - `payload` is opaque here. `DeleteTask` decodes it.
/// - `fail_delay` is in seconds and grows every time the job fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Assigned by the queue on enqueue. `None` until then.
    #[serde(default)]
    pub id: Option<TaskId>,

    /// Job class name (e.g. `course_delete_modules`).
    pub kind: String,

    /// The user the job runs as.
    #[serde(default)]
    pub actor_id: Option<ActorId>,

    pub payload: serde_json::Value,

    pub next_run_time: DateTime<Utc>,

    #[serde(default)]
    pub fail_delay: u64,

    /// Set while a runner holds the job.
    #[serde(default)]
    pub locked: bool,
}

impl JobRecord {
    pub fn new(
        kind: impl Into<String>,
        actor_id: Option<ActorId>,
        payload: serde_json::Value,
        next_run_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            actor_id,
            payload,
            next_run_time,
            fail_delay: 0,
            locked: false,
        }
    }

    /// Reset the failure backoff so the job runs at `now`.
    pub fn reset_backoff(&mut self, now: DateTime<Utc>) {
        self.fail_delay = 0;
        self.next_run_time = now;
    }

    /// Two jobs are equivalent when a runner could not tell them apart:
    /// same class, same actor, same payload.
    pub fn is_equivalent(&self, other: &JobRecord) -> bool {
        self.kind == other.kind && self.actor_id == other.actor_id && self.payload == other.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn job(actor: Option<u64>, payload: serde_json::Value) -> JobRecord {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        JobRecord::new("course_delete_modules", actor.map(ActorId::new), payload, at)
    }

    #[test]
    fn reset_backoff_clears_delay() {
        let mut record = job(Some(2), json!({}));
        record.fail_delay = 240;
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        record.reset_backoff(now);

        assert_eq!(record.fail_delay, 0);
        assert_eq!(record.next_run_time, now);
    }

    #[rstest]
    #[case::same(Some(2), json!({"targets": [{"id": 1}]}), true)]
    #[case::other_actor(Some(3), json!({"targets": [{"id": 1}]}), false)]
    #[case::no_actor(None, json!({"targets": [{"id": 1}]}), false)]
    #[case::other_payload(Some(2), json!({"targets": [{"id": 2}]}), false)]
    fn equivalence_matches_actor_kind_and_payload(
        #[case] actor: Option<u64>,
        #[case] payload: serde_json::Value,
        #[case] expected: bool,
    ) {
        let base = job(Some(2), json!({"targets": [{"id": 1}]}));
        let mut other = job(actor, payload);
        other.fail_delay = 60; // backoff state does not matter
        assert_eq!(base.is_equivalent(&other), expected);
    }
}
