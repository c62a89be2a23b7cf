//! StoreBackedHooks - サブシステムの副作用をレコードストア上で再現する実装
//!
//! 本番ではファイル API やカレンダー API が担う処理を、同じテーブルへの
//! 削除・更新として表現します。CLI のスナップショット運用とテストで使用。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{ContainerId, PlacementId, ScopeId, StoreError, TargetId};
use crate::ports::record_store::{Filter, RecordStore, Row, field_u64, schema};
use crate::ports::SubsystemHooks;

/// Component under which tags attach directly to a target record.
const CORE_TAG_COMPONENT: &str = "core";

/// StoreBackedHooks は任意の RecordStore 上で SubsystemHooks を実装
pub struct StoreBackedHooks {
    store: Arc<dyn RecordStore>,
}

impl StoreBackedHooks {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Sequence column of a placement row as a list of target ids.
    fn sequence_of(row: &Row) -> Vec<u64> {
        row.get(schema::PLACEMENT_SEQUENCE)
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default()
    }

    fn with_sequence(mut row: Row, sequence: Vec<u64>) -> Row {
        row.insert(schema::PLACEMENT_SEQUENCE.to_string(), Value::from(sequence));
        row
    }

    async fn try_remove_from_placement(
        &self,
        target: TargetId,
        placement: Option<PlacementId>,
    ) -> Result<(), StoreError> {
        let Some(placement) = placement else {
            return Ok(());
        };
        let Some(row) = self
            .store
            .get(schema::PLACEMENTS, &Filter::id(placement.get()))
            .await?
        else {
            return Ok(());
        };
        let sequence = Self::sequence_of(&row);
        if !sequence.contains(&target.get()) {
            return Ok(());
        }
        let remaining = sequence.into_iter().filter(|id| *id != target.get()).collect();
        self.store
            .insert_or_update(schema::PLACEMENTS, Self::with_sequence(row, remaining))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SubsystemHooks for StoreBackedHooks {
    async fn purge_artifacts(&self, scope: ScopeId) -> Result<(), StoreError> {
        let removed = self
            .store
            .delete(schema::ARTIFACTS, &Filter::new().eq(schema::SCOPE_REF, scope.get()))
            .await?;
        debug!(%scope, removed, "artifacts purged");
        Ok(())
    }

    async fn delete_calendar_event(
        &self,
        mut event: Row,
        container_scope: Option<ScopeId>,
    ) -> Result<(), StoreError> {
        let Some(id) = field_u64(&event, schema::ID) else {
            return Err(StoreError::new(schema::EVENTS, "event row without id"));
        };
        if let Some(scope) = container_scope {
            event.insert(schema::EVENT_SCOPE.to_string(), Value::from(scope.get()));
            self.store.insert_or_update(schema::EVENTS, event).await?;
        }
        self.store.delete(schema::EVENTS, &Filter::id(id)).await?;
        Ok(())
    }

    async fn delete_scoring_item(&self, item: Row) -> Result<(), StoreError> {
        let Some(id) = field_u64(&item, schema::ID) else {
            return Err(StoreError::new(schema::SCORING_ITEMS, "grade item without id"));
        };
        self.store
            .delete(
                schema::SCORING_GRADES,
                &Filter::new().eq(schema::SCORING_GRADE_ITEM, id),
            )
            .await?;
        self.store.delete(schema::SCORING_ITEMS, &Filter::id(id)).await?;
        Ok(())
    }

    async fn purge_associations(&self, scope: ScopeId) -> Result<(), StoreError> {
        self.store
            .delete(
                schema::ASSOCIATIONS,
                &Filter::new().eq(schema::SCOPE_REF, scope.get()),
            )
            .await?;
        Ok(())
    }

    async fn purge_tags(
        &self,
        scope: ScopeId,
        kind_name: Option<&str>,
        target: TargetId,
    ) -> Result<(), StoreError> {
        let mut by_scope = Filter::new().eq(schema::SCOPE_REF, scope.get());
        if let Some(kind) = kind_name {
            by_scope = by_scope.eq(schema::TAG_COMPONENT, format!("mod_{kind}"));
        }
        self.store.delete(schema::TAG_INSTANCES, &by_scope).await?;
        self.store
            .delete(
                schema::TAG_INSTANCES,
                &Filter::new()
                    .eq(schema::TAG_COMPONENT, CORE_TAG_COMPONENT)
                    .eq(schema::TAG_ITEM_TYPE, schema::TARGETS)
                    .eq(schema::TAG_ITEM_ID, target.get()),
            )
            .await?;
        Ok(())
    }

    async fn notify_competency(&self, target: TargetId) -> Result<(), StoreError> {
        self.store
            .delete(
                schema::COMPETENCY_LINKS,
                &Filter::new().eq(schema::COMPETENCY_TARGET, target.get()),
            )
            .await?;
        Ok(())
    }

    /// Re-derive placement listings from the live target records, then bump
    /// the container's cache revision.
    ///
    /// Live targets missing from their listing are appended; listed ids with
    /// no live target record are dropped.
    async fn rebuild_structure_cache(&self, container: ContainerId) -> Result<(), StoreError> {
        let targets = self
            .store
            .get_all(
                schema::TARGETS,
                &Filter::new().eq(schema::TARGET_CONTAINER, container.get()),
            )
            .await?;
        let placements = self
            .store
            .get_all(
                schema::PLACEMENTS,
                &Filter::new().eq(schema::TARGET_CONTAINER, container.get()),
            )
            .await?;

        for placement in placements {
            let Some(placement_id) = field_u64(&placement, schema::ID) else {
                continue;
            };
            let live: Vec<u64> = targets
                .iter()
                .filter(|t| field_u64(t, schema::TARGET_PLACEMENT) == Some(placement_id))
                .filter_map(|t| field_u64(t, schema::ID))
                .collect();
            let current = Self::sequence_of(&placement);
            let mut rebuilt: Vec<u64> =
                current.iter().copied().filter(|id| live.contains(id)).collect();
            for id in &live {
                if !rebuilt.contains(id) {
                    rebuilt.push(*id);
                }
            }
            if rebuilt != current {
                debug!(placement_id, ?current, ?rebuilt, "placement listing rebuilt");
                self.store
                    .insert_or_update(schema::PLACEMENTS, Self::with_sequence(placement, rebuilt))
                    .await?;
            }
        }

        if let Some(mut course) = self
            .store
            .get(schema::CONTAINERS, &Filter::id(container.get()))
            .await?
        {
            let revision = field_u64(&course, schema::CONTAINER_CACHE_REV).unwrap_or(0) + 1;
            course.insert(schema::CONTAINER_CACHE_REV.to_string(), Value::from(revision));
            self.store.insert_or_update(schema::CONTAINERS, course).await?;
        }
        Ok(())
    }

    async fn purge_module_info_cache(
        &self,
        container: ContainerId,
        target: TargetId,
    ) -> Result<(), StoreError> {
        self.store
            .delete(
                schema::MODULE_INFO_CACHE,
                &Filter::new()
                    .eq(schema::CACHE_CONTAINER, container.get())
                    .eq(schema::CACHE_TARGET, target.get()),
            )
            .await?;
        Ok(())
    }

    async fn remove_from_placement(
        &self,
        target: TargetId,
        placement: Option<PlacementId>,
    ) -> bool {
        match self.try_remove_from_placement(target, placement).await {
            Ok(()) => false,
            Err(error) => {
                warn!(target_id = %target, %error, "placement listing not updated");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryRecordStore;
    use serde_json::json;

    async fn setup() -> (InMemoryRecordStore, StoreBackedHooks) {
        let store = InMemoryRecordStore::new();
        let hooks = StoreBackedHooks::new(Arc::new(store.clone()));
        (store, hooks)
    }

    #[tokio::test]
    async fn placement_removal_keeps_the_inverted_flag() {
        let (store, hooks) = setup().await;
        store
            .seed("course_sections", json!({"id": 8, "course": 3, "sequence": [11, 12, 13]}))
            .await;

        // false == success
        assert!(!hooks.remove_from_placement(TargetId::new(12), Some(PlacementId::new(8))).await);
        assert_eq!(store.rows("course_sections").await[0]["sequence"], json!([11, 13]));

        // already gone: still success
        assert!(!hooks.remove_from_placement(TargetId::new(12), Some(PlacementId::new(8))).await);
        assert!(!hooks.remove_from_placement(TargetId::new(12), None).await);

        store.fail_writes("course_sections").await;
        assert!(hooks.remove_from_placement(TargetId::new(11), Some(PlacementId::new(8))).await);
    }

    #[tokio::test]
    async fn calendar_event_is_rebound_then_deleted() {
        let (store, hooks) = setup().await;
        store.seed("event", json!({"id": 4, "instance": 40, "modulename": "page"})).await;
        let event = store.rows("event").await.remove(0);

        hooks
            .delete_calendar_event(event, Some(ScopeId::new(77)))
            .await
            .unwrap();

        assert!(store.rows("event").await.is_empty());
    }

    #[tokio::test]
    async fn scoring_item_takes_its_grades_along() {
        let (store, hooks) = setup().await;
        store.seed("grade_items", json!({"id": 6, "itemmodule": "assign"})).await;
        store.seed("grade_grades", json!({"id": 1, "itemid": 6})).await;
        store.seed("grade_grades", json!({"id": 2, "itemid": 7})).await;
        let item = store.rows("grade_items").await.remove(0);

        hooks.delete_scoring_item(item).await.unwrap();

        assert!(store.rows("grade_items").await.is_empty());
        assert_eq!(store.rows("grade_grades").await.len(), 1);
    }

    #[tokio::test]
    async fn tags_are_purged_by_scope_and_by_target() {
        let (store, hooks) = setup().await;
        store.seed("tag_instance", json!({"id": 1, "component": "mod_page", "contextid": 70})).await;
        store
            .seed(
                "tag_instance",
                json!({"id": 2, "component": "core", "itemtype": "course_modules", "itemid": 12}),
            )
            .await;
        store.seed("tag_instance", json!({"id": 3, "component": "mod_page", "contextid": 71})).await;

        hooks
            .purge_tags(ScopeId::new(70), Some("page"), TargetId::new(12))
            .await
            .unwrap();

        let left = store.rows("tag_instance").await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0]["id"], 3);
    }

    #[tokio::test]
    async fn rebuild_repairs_listings_and_bumps_revision() {
        let (store, hooks) = setup().await;
        store.seed("course", json!({"id": 3, "cacherev": 5})).await;
        store.seed("course_modules", json!({"id": 11, "course": 3, "section": 8})).await;
        store.seed("course_modules", json!({"id": 12, "course": 3, "section": 8})).await;
        store
            .seed("course_sections", json!({"id": 8, "course": 3, "sequence": [11, 99]}))
            .await;

        hooks.rebuild_structure_cache(ContainerId::new(3)).await.unwrap();

        assert_eq!(store.rows("course_sections").await[0]["sequence"], json!([11, 12]));
        assert_eq!(store.rows("course").await[0]["cacherev"], 6);
    }
}
