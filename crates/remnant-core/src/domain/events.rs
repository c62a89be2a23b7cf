//! Events - ドメインイベント
//!
//! 修復が完了した対象について、通常の削除と同じ「削除された」イベントを発行します。
//! 受け取り側（ログ、監査、キャッシュ無効化など）は EventSink の実装次第です。

use serde::{Deserialize, Serialize};

use super::ids::{ContainerId, InstanceId, ScopeId, TargetId};

/// DomainEvent はドメインで発生したイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A target was removed by the repair path.
    EntityDeleted {
        container_id: Option<ContainerId>,
        scope_id: ScopeId,
        target_id: TargetId,
        instance_id: Option<InstanceId>,
        kind_name: String,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::EntityDeleted { .. } => "entity_deleted",
        }
    }
}
