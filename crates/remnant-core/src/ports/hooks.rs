//! SubsystemHooks port - 修復中に呼び出す外部サブシステム
//!
//! ファイル、カレンダー、成績、ブログ、タグ、コンピテンシー、コース構造キャッシュ。
//! それぞれの内部動作はこのエンジンの関心外で、呼び出し口だけを定義します。

use async_trait::async_trait;

use crate::domain::{ContainerId, PlacementId, ScopeId, StoreError, TargetId};
use crate::ports::record_store::Row;

/// SubsystemHooks は削除に伴う副作用の呼び出し口
#[async_trait]
pub trait SubsystemHooks: Send + Sync {
    /// Remove every stored file attached to `scope`.
    async fn purge_artifacts(&self, scope: ScopeId) -> Result<(), StoreError>;

    /// Delete one calendar event after re-binding it to the container scope.
    async fn delete_calendar_event(
        &self,
        event: Row,
        container_scope: Option<ScopeId>,
    ) -> Result<(), StoreError>;

    /// Delete one grade item and everything graded against it.
    async fn delete_scoring_item(&self, item: Row) -> Result<(), StoreError>;

    /// Remove blog (and other cross-subsystem) associations of `scope`.
    async fn purge_associations(&self, scope: ScopeId) -> Result<(), StoreError>;

    /// Remove tag instances by scope and by direct reference to the target.
    async fn purge_tags(
        &self,
        scope: ScopeId,
        kind_name: Option<&str>,
        target: TargetId,
    ) -> Result<(), StoreError>;

    /// Tell the competency subsystem the target is gone.
    async fn notify_competency(&self, target: TargetId) -> Result<(), StoreError>;

    async fn rebuild_structure_cache(&self, container: ContainerId) -> Result<(), StoreError>;

    async fn purge_module_info_cache(
        &self,
        container: ContainerId,
        target: TargetId,
    ) -> Result<(), StoreError>;

    /// Remove `target` from its placement listing.
    ///
    /// Legacy contract: **`false` means success**, `true` means the listing
    /// could not be updated. Use [`placement_removal`] instead of reading the
    /// flag directly.
    async fn remove_from_placement(&self, target: TargetId, placement: Option<PlacementId>)
    -> bool;
}

/// The placement listing could not be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("placement listing of {0} could not be updated")]
pub struct PlacementRemovalFailed(pub TargetId);

/// `remove_from_placement` with its inverted flag turned into a `Result`.
pub async fn placement_removal(
    hooks: &dyn SubsystemHooks,
    target: TargetId,
    placement: Option<PlacementId>,
) -> Result<(), PlacementRemovalFailed> {
    if hooks.remove_from_placement(target, placement).await {
        Err(PlacementRemovalFailed(target))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hooks whose placement removal always returns the given raw flag.
    struct RawFlag(bool);

    #[async_trait]
    impl SubsystemHooks for RawFlag {
        async fn purge_artifacts(&self, _: ScopeId) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete_calendar_event(&self, _: Row, _: Option<ScopeId>) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete_scoring_item(&self, _: Row) -> Result<(), StoreError> {
            Ok(())
        }
        async fn purge_associations(&self, _: ScopeId) -> Result<(), StoreError> {
            Ok(())
        }
        async fn purge_tags(&self, _: ScopeId, _: Option<&str>, _: TargetId) -> Result<(), StoreError> {
            Ok(())
        }
        async fn notify_competency(&self, _: TargetId) -> Result<(), StoreError> {
            Ok(())
        }
        async fn rebuild_structure_cache(&self, _: ContainerId) -> Result<(), StoreError> {
            Ok(())
        }
        async fn purge_module_info_cache(&self, _: ContainerId, _: TargetId) -> Result<(), StoreError> {
            Ok(())
        }
        async fn remove_from_placement(&self, _: TargetId, _: Option<PlacementId>) -> bool {
            self.0
        }
    }

    #[tokio::test]
    async fn falsy_flag_is_success() {
        let result = placement_removal(&RawFlag(false), TargetId::new(1), None).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn truthy_flag_is_failure() {
        let result = placement_removal(&RawFlag(true), TargetId::new(1), None).await;
        assert_eq!(result, Err(PlacementRemovalFailed(TargetId::new(1))));
    }
}
