//! DeleteTask / TargetDescriptor - 診断対象の値オブジェクト
//!
//! キューの 1 ジョブを `DeleteTask` として、その中の削除対象を
//! `TargetDescriptor` として表現します。どちらも構築後は不変です。
//! ストアを引いて値を埋めるのは `app::catalog::TargetResolver` の仕事です。

use serde::{Deserialize, Serialize};

use super::errors::RemnantError;
use super::ids::{ActorId, ContainerId, InstanceId, KindId, PlacementId, TargetId, TaskId};
use super::payload::TargetEntry;

/// One entity targeted for deletion, with whatever could be resolved.
///
/// `kind_name` が `None` ⇔ 構築時に種類を解決できなかった（それ自体が症状）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub target_id: TargetId,
    pub container_id: Option<ContainerId>,
    pub kind_id: Option<KindId>,
    pub kind_name: Option<String>,
    pub placement_id: Option<PlacementId>,
    pub instance_id: Option<InstanceId>,
    /// Whether the live target record existed when this was built.
    pub found_in_store: bool,
}

impl TargetDescriptor {
    /// Descriptor carrying only what the payload said.
    pub fn unresolved(target_id: TargetId) -> Self {
        Self {
            target_id,
            container_id: None,
            kind_id: None,
            kind_name: None,
            placement_id: None,
            instance_id: None,
            found_in_store: false,
        }
    }

    /// Payload entry carrying this descriptor's best-known identifiers.
    pub fn to_entry(&self) -> TargetEntry {
        TargetEntry {
            id: Some(self.target_id),
            container: self.container_id,
            kind: self.kind_id,
            instance: self.instance_id,
            placement: self.placement_id,
            deletion_in_progress: false,
        }
    }
}

/// A queued deletion job and its decoded targets.
///
/// # 不変条件
/// - targets と unidentified を合わせて 1 件以上（0 件のタスクは診断しない）
/// - targets は payload の記述順
/// - unidentified は id を持たない payload エントリ（解決できないので記述のまま保持）
///
/// `Deserialize` も `from_parts()` を通るため、復元された値も同じ不変条件を満たします。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DeleteTaskRecord")]
pub struct DeleteTask {
    task_id: TaskId,
    raw_payload: serde_json::Value,
    actor_id: Option<ActorId>,
    targets: Vec<TargetDescriptor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unidentified: Vec<TargetEntry>,
}

/// Wire shape of `DeleteTask`, checked by `TryFrom` on the way in.
#[derive(Deserialize)]
struct DeleteTaskRecord {
    task_id: TaskId,
    raw_payload: serde_json::Value,
    actor_id: Option<ActorId>,
    targets: Vec<TargetDescriptor>,
    #[serde(default)]
    unidentified: Vec<TargetEntry>,
}

impl TryFrom<DeleteTaskRecord> for DeleteTask {
    type Error = RemnantError;

    fn try_from(record: DeleteTaskRecord) -> Result<Self, Self::Error> {
        DeleteTask::from_parts(
            record.task_id,
            record.raw_payload,
            record.actor_id,
            record.targets,
            record.unidentified,
        )
    }
}

impl DeleteTask {
    pub fn new(
        task_id: TaskId,
        raw_payload: serde_json::Value,
        actor_id: Option<ActorId>,
        targets: Vec<TargetDescriptor>,
    ) -> Result<Self, RemnantError> {
        Self::from_parts(task_id, raw_payload, actor_id, targets, Vec::new())
    }

    /// Like `new()`, also keeping payload entries that carry no target id.
    pub fn from_parts(
        task_id: TaskId,
        raw_payload: serde_json::Value,
        actor_id: Option<ActorId>,
        targets: Vec<TargetDescriptor>,
        unidentified: Vec<TargetEntry>,
    ) -> Result<Self, RemnantError> {
        if targets.is_empty() && unidentified.is_empty() {
            return Err(RemnantError::EmptyTask(task_id));
        }
        Ok(Self {
            task_id,
            raw_payload,
            actor_id,
            targets,
            unidentified,
        })
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn raw_payload(&self) -> &serde_json::Value {
        &self.raw_payload
    }

    pub fn actor_id(&self) -> Option<ActorId> {
        self.actor_id
    }

    pub fn targets(&self) -> &[TargetDescriptor] {
        &self.targets
    }

    /// Payload entries without a target id, in payload order.
    pub fn unidentified(&self) -> &[TargetEntry] {
        &self.unidentified
    }

    pub fn target(&self, target_id: TargetId) -> Option<&TargetDescriptor> {
        self.targets.iter().find(|t| t.target_id == target_id)
    }

    /// The first (for single-target tasks: the only) identified target.
    ///
    /// `None` when the task's only entry carries no target id.
    pub fn first_target(&self) -> Option<&TargetDescriptor> {
        self.targets.first()
    }

    pub fn target_ids(&self) -> Vec<TargetId> {
        self.targets.iter().map(|t| t.target_id).collect()
    }

    /// Every payload entry, identified or not.
    pub fn target_count(&self) -> usize {
        self.targets.len() + self.unidentified.len()
    }

    pub fn is_multi_target(&self) -> bool {
        self.target_count() > 1
    }
}
