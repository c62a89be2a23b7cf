//! Surgeon - Diagnosis に応じた修復を実行し、Outcome を返す
//!
//! # 優先順位（最初に一致したものだけ実行）
//! 1. AdhocRecordMissing → 助言メッセージのみ（ストアには触れない）
//! 2. MultiTarget → 対象ごとの単独タスクに分割し、元のタスクを削除
//! 3. それ以外 → 単独対象の修復（クリーンアップ手順 a〜p）
//!
//! # 設計原則
//! - 変更系の失敗はメッセージとして記録し、後続の独立した手順は続行
//! - 読み取りの失敗は `Err` で返し、このタスクの修復だけを中断
//! - 前提条件のない手順はメッセージを出さずにスキップ（再実行しても安全）

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::catalog::TargetResolver;
use super::config::RepairConfig;
use crate::domain::{
    CleanupStep, ContainerId, DeletePayload, DeleteTask, Diagnosis, DomainEvent, InstanceId,
    JobRecord, KindId, Outcome, OutcomeMessage, PlacementId, RemnantError, ScopeId, SymptomKind,
    TargetDescriptor, TargetEntry, TargetId,
};
use crate::ports::record_store::{Filter, RecordStore, Row, field_u64, schema};
use crate::ports::{Clock, EventSink, SubsystemHooks, TaskQueue, placement_removal};

/// Grade item type of activity-owned items.
const ACTIVITY_ITEM_TYPE: &str = "mod";

/// What is known about the target record at the start of cleanup.
///
/// Built from the live row when it exists, else synthesized from the
/// descriptor so the remaining steps can still run.
#[derive(Debug, Clone)]
struct Entity {
    target_id: TargetId,
    container_id: Option<ContainerId>,
    kind_id: Option<KindId>,
    instance_id: Option<InstanceId>,
    placement_id: Option<PlacementId>,
    live: bool,
}

impl Entity {
    fn from_row(row: &Row, target: &TargetDescriptor) -> Self {
        Self {
            target_id: target.target_id,
            container_id: field_u64(row, schema::TARGET_CONTAINER)
                .map(ContainerId::new)
                .or(target.container_id),
            kind_id: field_u64(row, schema::TARGET_KIND)
                .map(KindId::new)
                .or(target.kind_id),
            instance_id: field_u64(row, schema::TARGET_INSTANCE)
                .map(InstanceId::new)
                .or(target.instance_id),
            placement_id: field_u64(row, schema::TARGET_PLACEMENT)
                .map(PlacementId::new)
                .or(target.placement_id),
            live: true,
        }
    }

    fn synthesized(target: &TargetDescriptor) -> Self {
        Self {
            target_id: target.target_id,
            container_id: target.container_id,
            kind_id: target.kind_id,
            instance_id: target.instance_id,
            placement_id: target.placement_id,
            live: false,
        }
    }

    fn to_entry(&self) -> TargetEntry {
        TargetEntry {
            id: Some(self.target_id),
            container: self.container_id,
            kind: self.kind_id,
            instance: self.instance_id,
            placement: self.placement_id,
            deletion_in_progress: self.live,
        }
    }
}

/// Surgeon は修復を実行
pub struct Surgeon {
    queue: Arc<dyn TaskQueue>,
    store: Arc<dyn RecordStore>,
    hooks: Arc<dyn SubsystemHooks>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    resolver: TargetResolver,
    config: RepairConfig,
}

impl Surgeon {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        store: Arc<dyn RecordStore>,
        hooks: Arc<dyn SubsystemHooks>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: RepairConfig,
    ) -> Self {
        Self {
            queue,
            resolver: TargetResolver::new(store.clone()),
            store,
            hooks,
            events,
            clock,
            config,
        }
    }

    pub async fn operate(&self, diagnosis: &Diagnosis) -> Result<Outcome, RemnantError> {
        let task = diagnosis.task();
        let symptoms = diagnosis.symptoms();

        let messages = if symptoms.has_task_symptom(SymptomKind::AdhocRecordMissing) {
            vec![OutcomeMessage::AdhocTaskAdvice]
        } else if symptoms.has_task_symptom(SymptomKind::MultiTarget) {
            self.split(task).await?
        } else {
            self.repair_single(diagnosis).await?
        };

        let outcome = Outcome::new(task.clone(), messages);
        info!(
            task_id = %task.task_id(),
            messages = outcome.messages().len(),
            success = outcome.is_success(),
            "task operated"
        );
        Ok(outcome)
    }

    // ---- split protocol ----------------------------------------------------

    async fn split(&self, task: &DeleteTask) -> Result<Vec<OutcomeMessage>, RemnantError> {
        let mut messages = Vec::new();

        for target in task.targets() {
            let live = self
                .store
                .get(schema::TARGETS, &Filter::id(target.target_id.get()))
                .await?;
            let entity = match live {
                Some(mut row) => {
                    row.insert(schema::TARGET_DELETION_IN_PROGRESS.to_string(), 1.into());
                    if let Err(error) = self.store.insert_or_update(schema::TARGETS, row.clone()).await {
                        warn!(target_id = %target.target_id, %error, "cannot flag target, split stopped");
                        messages.push(OutcomeMessage::TaskFixFailed);
                        return Ok(messages);
                    }
                    Entity::from_row(&row, target)
                }
                None => Entity::synthesized(target),
            };

            let payload = DeletePayload::single(entity.to_entry(), self.config.system_actor_id);
            let job = JobRecord::new(
                self.config.task_kind.clone(),
                Some(self.config.system_actor_id),
                payload.to_value(),
                self.clock.now(),
            );
            match self.queue.enqueue(job).await {
                Ok(new_id) => {
                    debug!(target_id = %target.target_id, %new_id, "single-target task queued");
                    messages.push(OutcomeMessage::SplitIntoIndividualTask(target.target_id));
                }
                Err(error) => {
                    // 元のタスクは残す（対象を失わないため）
                    warn!(target_id = %target.target_id, %error, "cannot queue single-target task, split stopped");
                    messages.push(OutcomeMessage::TaskFixFailed);
                    return Ok(messages);
                }
            }
        }

        // 引けるレコードが無いので単独タスクにはしない
        for entry in task.unidentified() {
            warn!(task_id = %task.task_id(), ?entry, "target entry without id left out of the split");
            messages.push(OutcomeMessage::TargetIdNotFound);
        }

        let deleted = match self.queue.delete_job(task.task_id()).await {
            Ok(deleted) => deleted,
            Err(error) => {
                warn!(task_id = %task.task_id(), %error, "cannot delete original task");
                false
            }
        };
        if deleted {
            messages.push(OutcomeMessage::OldTaskDeleted);
            messages.push(OutcomeMessage::TaskFixSuccessful);
        } else {
            messages.push(OutcomeMessage::OldTaskDeleteFailed);
            messages.push(OutcomeMessage::TaskFixFailed);
        }
        Ok(messages)
    }

    // ---- single-target repair ----------------------------------------------

    async fn repair_single(&self, diagnosis: &Diagnosis) -> Result<Vec<OutcomeMessage>, RemnantError> {
        let task = diagnosis.task();
        if task.is_multi_target() {
            warn!(task_id = %task.task_id(), "single-target repair reached with several targets");
            return Ok(vec![
                OutcomeMessage::MultiTargetTask,
                OutcomeMessage::ModuleFixFailed,
            ]);
        }
        let Some(target) = task.first_target() else {
            return Ok(vec![
                OutcomeMessage::TargetIdNotFound,
                OutcomeMessage::ModuleFixFailed,
            ]);
        };

        let mut messages = Vec::new();
        if diagnosis.has(SymptomKind::PlacementRecordMissing)
            && let Some(container) = target.container_id
        {
            match self.hooks.rebuild_structure_cache(container).await {
                Ok(()) => messages.push(OutcomeMessage::StructuralDataFixed),
                Err(error) => {
                    warn!(%container, %error, "structure rebuild failed");
                    messages.push(OutcomeMessage::StepFailed(CleanupStep::StructureRebuild));
                }
            }
        }

        self.cleanup(task, target, &mut messages).await?;
        Ok(messages)
    }

    /// Cleanup steps a to p.
    async fn cleanup(
        &self,
        task: &DeleteTask,
        target: &TargetDescriptor,
        messages: &mut Vec<OutcomeMessage>,
    ) -> Result<(), RemnantError> {
        let target_id = target.target_id;

        // a. entity
        let entity = match self
            .store
            .get(schema::TARGETS, &Filter::id(target_id.get()))
            .await?
        {
            Some(row) => Entity::from_row(&row, target),
            None => {
                messages.push(OutcomeMessage::EntityRecordNotFound);
                Entity::synthesized(target)
            }
        };

        // b. scope
        let scope = self
            .scope_of(self.config.scope_level, target_id.get())
            .await?;
        if scope.is_none() {
            debug!(%target_id, "no scope record, scope steps skipped");
        }

        // c. kind
        let kind = match &target.kind_name {
            Some(name) => Some(name.clone()),
            None => match entity.kind_id {
                Some(kind_id) => self.resolver.kind_name(kind_id).await?,
                None => None,
            },
        };

        // d. artifacts
        if let Some(scope) = scope {
            match self.hooks.purge_artifacts(scope).await {
                Ok(()) => messages.push(OutcomeMessage::ArtifactRecordsDeleted),
                Err(error) => self.step_failed(messages, CleanupStep::ArtifactPurge, &error),
            }
        }

        // e. calendar events
        if let (Some(kind), Some(container), Some(instance)) =
            (&kind, entity.container_id, entity.instance_id)
        {
            let events = self
                .store
                .get_all(
                    schema::EVENTS,
                    &Filter::new()
                        .eq(schema::EVENT_INSTANCE, instance.get())
                        .eq(schema::EVENT_KIND, kind.as_str()),
                )
                .await?;
            if !events.is_empty() {
                let container_scope = self
                    .scope_of(self.config.container_scope_level, container.get())
                    .await?;
                for event in events {
                    match self.hooks.delete_calendar_event(event, container_scope).await {
                        Ok(()) => messages.push(OutcomeMessage::CalendarEventDeleted),
                        Err(error) => self.step_failed(messages, CleanupStep::CalendarEvents, &error),
                    }
                }
            }
        }

        // f. scoring items
        if let (Some(kind), Some(container), Some(instance)) =
            (&kind, entity.container_id, entity.instance_id)
            && self.store.exists(kind, &Filter::id(instance.get())).await?
        {
            let items = self
                .store
                .get_all(
                    schema::SCORING_ITEMS,
                    &Filter::new()
                        .eq(schema::SCORING_TYPE, ACTIVITY_ITEM_TYPE)
                        .eq(schema::SCORING_KIND, kind.as_str())
                        .eq(schema::SCORING_INSTANCE, instance.get())
                        .eq(schema::SCORING_CONTAINER, container.get()),
                )
                .await?;
            for item in items {
                match self.hooks.delete_scoring_item(item).await {
                    Ok(()) => messages.push(OutcomeMessage::ScoringRecordsDeleted),
                    Err(error) => self.step_failed(messages, CleanupStep::ScoringItems, &error),
                }
            }
        }

        if let Some(scope) = scope {
            // g. associations
            match self.hooks.purge_associations(scope).await {
                Ok(()) => messages.push(OutcomeMessage::AssociationRecordsDeleted),
                Err(error) => self.step_failed(messages, CleanupStep::Associations, &error),
            }

            // h. completion
            self.purge_completion(&entity, messages).await;

            // i. tags
            match self.hooks.purge_tags(scope, kind.as_deref(), target_id).await {
                Ok(()) => messages.push(OutcomeMessage::TagRecordsDeleted),
                Err(error) => self.step_failed(messages, CleanupStep::Tags, &error),
            }
        }

        // j. competency (fire-and-forget)
        if let Err(error) = self.hooks.notify_competency(target_id).await {
            warn!(%target_id, %error, "competency notification failed");
        }

        // k. scope record
        if let Some(scope) = scope {
            match self.store.delete(schema::SCOPES, &Filter::id(scope.get())).await {
                Ok(_) => messages.push(OutcomeMessage::ScopeRecordDeleted),
                Err(error) => self.step_failed(messages, CleanupStep::ScopeDeletion, &error),
            }
        }

        // l. entity record
        if entity.live {
            match self.store.delete(schema::TARGETS, &Filter::id(target_id.get())).await {
                Ok(true) => messages.push(OutcomeMessage::EntityRecordDeleted),
                Ok(false) => messages.push(OutcomeMessage::EntityRecordDeleteFailed),
                Err(error) => {
                    warn!(%target_id, %error, "entity delete failed");
                    messages.push(OutcomeMessage::EntityRecordDeleteFailed);
                }
            }
        }

        // m. placement listing
        match placement_removal(self.hooks.as_ref(), target_id, entity.placement_id).await {
            Ok(()) => messages.push(OutcomeMessage::PlacementDataDeleted),
            Err(error) => {
                warn!(%error, "placement removal failed");
                messages.push(OutcomeMessage::PlacementDataDeleteFailed);
            }
        }

        // n. deleted event + caches
        if let (Some(scope), Some(kind)) = (scope, &kind) {
            self.announce_deletion(&entity, scope, kind, messages).await;
        }

        // o. reschedule
        messages.push(self.reschedule(task).await);

        // p.
        messages.push(OutcomeMessage::ModuleFixSuccessful);
        Ok(())
    }

    async fn scope_of(&self, level: u64, instance: u64) -> Result<Option<ScopeId>, RemnantError> {
        let row = self
            .store
            .get(
                schema::SCOPES,
                &Filter::new()
                    .eq(schema::SCOPE_LEVEL, level)
                    .eq(schema::SCOPE_INSTANCE, instance),
            )
            .await?;
        Ok(row
            .as_ref()
            .and_then(|r| field_u64(r, schema::ID))
            .map(ScopeId::new))
    }

    async fn purge_completion(&self, entity: &Entity, messages: &mut Vec<OutcomeMessage>) {
        let target = entity.target_id.get();
        match self
            .store
            .delete(
                schema::COMPLETION,
                &Filter::new().eq(schema::COMPLETION_TARGET, target),
            )
            .await
        {
            Ok(true) => messages.push(OutcomeMessage::CompletionRecordsDeleted),
            Ok(false) => {}
            Err(error) => self.step_failed(messages, CleanupStep::Completion, &error),
        }

        let Some(container) = entity.container_id else {
            return;
        };
        let criteria = Filter::new()
            .eq(schema::CRITERIA_TARGET, target)
            .eq(schema::CRITERIA_CONTAINER, container.get())
            .eq(schema::CRITERIA_TYPE, self.config.activity_criteria_type);
        match self.store.delete(schema::COMPLETION_CRITERIA, &criteria).await {
            Ok(true) => messages.push(OutcomeMessage::CompletionCriteriaRecordsDeleted),
            Ok(false) => {}
            Err(error) => self.step_failed(messages, CleanupStep::Completion, &error),
        }
    }

    async fn announce_deletion(
        &self,
        entity: &Entity,
        scope: ScopeId,
        kind: &str,
        messages: &mut Vec<OutcomeMessage>,
    ) {
        let event = DomainEvent::EntityDeleted {
            container_id: entity.container_id,
            scope_id: scope,
            target_id: entity.target_id,
            instance_id: entity.instance_id,
            kind_name: kind.to_string(),
        };
        if let Err(error) = self.events.emit(event).await {
            self.step_failed(messages, CleanupStep::DeletedEvent, &error);
        }

        let Some(container) = entity.container_id else {
            return;
        };
        if let Err(error) = self
            .hooks
            .purge_module_info_cache(container, entity.target_id)
            .await
        {
            self.step_failed(messages, CleanupStep::StructureRebuild, &error);
        }
        if let Err(error) = self.hooks.rebuild_structure_cache(container).await {
            self.step_failed(messages, CleanupStep::StructureRebuild, &error);
        }
    }

    /// Reset the originating job so it runs again right away. One attempt only.
    async fn reschedule(&self, task: &DeleteTask) -> OutcomeMessage {
        let task_id = task.task_id();
        let queued = match self
            .queue
            .list_jobs(&self.config.task_kind, Some(&[task_id]), None)
            .await
        {
            Ok(jobs) => jobs.into_iter().next(),
            Err(error) => {
                warn!(%task_id, %error, "cannot look up task to reschedule");
                None
            }
        };
        let Some(mut job) = queued else {
            return OutcomeMessage::TaskRescheduleFailed;
        };
        job.reset_backoff(self.clock.now());
        match self.queue.reschedule_or_enqueue(job).await {
            Ok(_) => OutcomeMessage::TaskRescheduled,
            Err(error) => {
                warn!(%task_id, %error, "reschedule failed");
                OutcomeMessage::TaskRescheduleFailed
            }
        }
    }

    fn step_failed(
        &self,
        messages: &mut Vec<OutcomeMessage>,
        step: CleanupStep,
        error: &dyn std::error::Error,
    ) {
        warn!(%step, %error, "cleanup step failed");
        messages.push(OutcomeMessage::StepFailed(step));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActorId, SymptomKey, SymptomSet, TaskId};
    use crate::impls::{InMemoryRecordStore, RecordingEventSink, StoreBackedHooks};
    use crate::ports::FixedClock;
    use crate::queue::{InMemoryTaskQueue, RetryPolicy};
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    use OutcomeMessage::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    struct Fixture {
        store: InMemoryRecordStore,
        queue: Arc<InMemoryTaskQueue>,
        sink: RecordingEventSink,
        surgeon: Surgeon,
    }

    fn fixture() -> Fixture {
        let store = InMemoryRecordStore::new();
        let clock = Arc::new(FixedClock::new(now()));
        let queue = Arc::new(InMemoryTaskQueue::new(clock.clone(), RetryPolicy::standard()));
        let sink = RecordingEventSink::new();
        let surgeon = Surgeon::new(
            queue.clone(),
            Arc::new(store.clone()),
            Arc::new(StoreBackedHooks::new(Arc::new(store.clone()))),
            Arc::new(sink.clone()),
            clock,
            RepairConfig::default(),
        );
        Fixture {
            store,
            queue,
            sink,
            surgeon,
        }
    }

    /// Page module 12 (instance 40) in course 3, section 8, with scope 90
    /// and one of every dependent record. Module 11 shares the section.
    async fn seed_module(store: &InMemoryRecordStore) {
        store.seed("course", json!({"id": 3, "cacherev": 1})).await;
        store.seed("context", json!({"id": 30, "contextlevel": 50, "instanceid": 3})).await;
        store
            .seed(
                "course_modules",
                json!({"id": 12, "course": 3, "module": 5, "instance": 40, "section": 8}),
            )
            .await;
        store
            .seed(
                "course_modules",
                json!({"id": 11, "course": 3, "module": 5, "instance": 39, "section": 8}),
            )
            .await;
        store.seed("modules", json!({"id": 5, "name": "page"})).await;
        store.seed("page", json!({"id": 40})).await;
        store.seed("context", json!({"id": 90, "contextlevel": 70, "instanceid": 12})).await;
        store.seed("course_sections", json!({"id": 8, "course": 3, "sequence": [11, 12]})).await;
        store.seed("files", json!({"id": 1, "contextid": 90})).await;
        store.seed("event", json!({"id": 2, "instance": 40, "modulename": "page"})).await;
        store
            .seed(
                "grade_items",
                json!({"id": 3, "itemtype": "mod", "itemmodule": "page", "iteminstance": 40, "courseid": 3}),
            )
            .await;
        store.seed("blog_association", json!({"id": 4, "contextid": 90})).await;
        store.seed("course_modules_completion", json!({"id": 5, "coursemoduleid": 12})).await;
        store
            .seed(
                "course_completion_criteria",
                json!({"id": 6, "moduleinstance": 12, "course": 3, "criteriatype": 4}),
            )
            .await;
        store.seed("tag_instance", json!({"id": 7, "component": "mod_page", "contextid": 90})).await;
    }

    fn page_target() -> TargetDescriptor {
        let mut target = TargetDescriptor::unresolved(TargetId::new(12));
        target.container_id = Some(ContainerId::new(3));
        target.kind_id = Some(KindId::new(5));
        target.kind_name = Some("page".to_string());
        target.instance_id = Some(InstanceId::new(40));
        target.placement_id = Some(PlacementId::new(8));
        target.found_in_store = true;
        target
    }

    async fn queued_task(queue: &InMemoryTaskQueue, targets: Vec<TargetDescriptor>) -> DeleteTask {
        let payload = json!({"targets": targets.iter().map(|t| t.to_entry()).collect::<Vec<_>>()});
        let mut job = JobRecord::new("course_delete_modules", Some(ActorId::new(2)), payload.clone(), now());
        job.fail_delay = 240;
        let id = queue.enqueue(job).await.unwrap();
        DeleteTask::new(id, payload, Some(ActorId::new(2)), targets).unwrap()
    }

    fn diagnosis(task: DeleteTask, symptoms: &[SymptomKind]) -> Diagnosis {
        let mut set = SymptomSet::new();
        for kind in symptoms {
            let key = if kind.is_task_level() {
                SymptomKey::Task(*kind)
            } else {
                SymptomKey::Target(task.targets()[0].target_id)
            };
            set.push(key, *kind);
        }
        Diagnosis::new(task, set)
    }

    #[tokio::test]
    async fn adhoc_missing_only_advises() {
        let f = fixture();
        seed_module(&f.store).await;
        let before = f.store.tables().await;
        let task = DeleteTask::new(TaskId::new(99), json!({}), None, vec![page_target()]).unwrap();

        let outcome = f
            .surgeon
            .operate(&diagnosis(task, &[SymptomKind::AdhocRecordMissing]))
            .await
            .unwrap();

        assert_eq!(outcome.messages(), &[AdhocTaskAdvice]);
        assert_eq!(f.store.tables().await, before);
    }

    #[tokio::test]
    async fn full_cleanup_runs_every_step_in_order() {
        let f = fixture();
        seed_module(&f.store).await;
        let task = queued_task(&f.queue, vec![page_target()]).await;

        let outcome = f
            .surgeon
            .operate(&diagnosis(task.clone(), &[SymptomKind::KindRecordMissing]))
            .await
            .unwrap();

        assert_eq!(
            outcome.messages(),
            &[
                ArtifactRecordsDeleted,
                CalendarEventDeleted,
                ScoringRecordsDeleted,
                AssociationRecordsDeleted,
                CompletionRecordsDeleted,
                CompletionCriteriaRecordsDeleted,
                TagRecordsDeleted,
                ScopeRecordDeleted,
                EntityRecordDeleted,
                PlacementDataDeleted,
                TaskRescheduled,
                ModuleFixSuccessful,
            ]
        );
        for table in [
            "files",
            "event",
            "grade_items",
            "blog_association",
            "course_modules_completion",
            "course_completion_criteria",
            "tag_instance",
        ] {
            assert!(f.store.rows(table).await.is_empty(), "{table} not purged");
        }
        assert!(!f.store.exists("course_modules", &Filter::id(12)).await.unwrap());
        assert!(f.store.exists("course_modules", &Filter::id(11)).await.unwrap());
        assert_eq!(f.store.rows("course_sections").await[0]["sequence"], json!([11]));
        assert_eq!(f.sink.events().await.len(), 1);

        let job = f.queue.get(task.task_id()).await.unwrap();
        assert_eq!(job.fail_delay, 0);
        assert_eq!(job.next_run_time, now());
    }

    #[tokio::test]
    async fn second_run_only_emits_terminal_messages() {
        let f = fixture();
        seed_module(&f.store).await;
        let task = queued_task(&f.queue, vec![page_target()]).await;
        let d = diagnosis(task, &[SymptomKind::KindRecordMissing]);
        f.surgeon.operate(&d).await.unwrap();
        let after_first = f.store.tables().await;

        let outcome = f.surgeon.operate(&d).await.unwrap();

        assert_eq!(
            outcome.messages(),
            &[
                EntityRecordNotFound,
                PlacementDataDeleted,
                TaskRescheduled,
                ModuleFixSuccessful,
            ]
        );
        assert_eq!(f.store.tables().await, after_first);
        assert_eq!(f.sink.events().await.len(), 1);
    }

    #[tokio::test]
    async fn missing_scope_skips_scope_steps_but_finishes() {
        let f = fixture();
        seed_module(&f.store).await;
        f.store.delete("context", &Filter::id(90)).await.unwrap();
        let task = queued_task(&f.queue, vec![page_target()]).await;

        let outcome = f
            .surgeon
            .operate(&diagnosis(task, &[SymptomKind::ScopeRecordMissing]))
            .await
            .unwrap();

        let messages = outcome.messages();
        for skipped in [
            ArtifactRecordsDeleted,
            AssociationRecordsDeleted,
            TagRecordsDeleted,
            ScopeRecordDeleted,
        ] {
            assert!(!messages.contains(&skipped), "{skipped:?} should be skipped");
        }
        assert!(messages.contains(&EntityRecordDeleted));
        assert!(messages.contains(&PlacementDataDeleted));
        assert!(messages.contains(&TaskRescheduled));
        assert!(f.sink.events().await.is_empty());
    }

    #[tokio::test]
    async fn placement_symptom_rebuilds_first() {
        let f = fixture();
        seed_module(&f.store).await;
        f.store
            .insert_or_update(
                "course_sections",
                json!({"id": 8, "sequence": [11]}).as_object().cloned().unwrap(),
            )
            .await
            .unwrap();
        let task = queued_task(&f.queue, vec![page_target()]).await;

        let outcome = f
            .surgeon
            .operate(&diagnosis(task, &[SymptomKind::PlacementRecordMissing]))
            .await
            .unwrap();

        assert_eq!(outcome.messages().first(), Some(&StructuralDataFixed));
        assert_eq!(outcome.messages().last(), Some(&ModuleFixSuccessful));
        assert_eq!(f.store.rows("course_sections").await[0]["sequence"], json!([11]));
    }

    #[tokio::test]
    async fn failing_mutation_is_recorded_and_cleanup_continues() {
        let f = fixture();
        seed_module(&f.store).await;
        f.store.fail_writes("files").await;
        let task = queued_task(&f.queue, vec![page_target()]).await;

        let outcome = f.surgeon.operate(&diagnosis(task, &[])).await.unwrap();

        assert_eq!(outcome.messages()[0], StepFailed(CleanupStep::ArtifactPurge));
        assert!(outcome.messages().contains(&EntityRecordDeleted));
        assert_eq!(outcome.messages().last(), Some(&ModuleFixSuccessful));
    }

    #[tokio::test]
    async fn failing_placement_listing_is_reported() {
        let f = fixture();
        seed_module(&f.store).await;
        f.store.fail_writes("course_sections").await;
        let task = queued_task(&f.queue, vec![page_target()]).await;

        let outcome = f.surgeon.operate(&diagnosis(task, &[])).await.unwrap();

        assert!(outcome.messages().contains(&PlacementDataDeleteFailed));
        assert!(!outcome.messages().contains(&PlacementDataDeleted));
    }

    #[tokio::test]
    async fn read_failure_aborts_the_repair() {
        let f = fixture();
        seed_module(&f.store).await;
        f.store.fail_reads("course_modules").await;
        let task = queued_task(&f.queue, vec![page_target()]).await;

        let err = f.surgeon.operate(&diagnosis(task, &[])).await.unwrap_err();

        assert!(matches!(err, RemnantError::Store(_)));
    }

    #[tokio::test]
    async fn vanished_job_cannot_be_rescheduled() {
        let f = fixture();
        seed_module(&f.store).await;
        let task = DeleteTask::new(TaskId::new(500), json!({}), None, vec![page_target()]).unwrap();

        let outcome = f.surgeon.operate(&diagnosis(task, &[])).await.unwrap();

        let messages = outcome.messages();
        assert_eq!(messages[messages.len() - 2], TaskRescheduleFailed);
        assert_eq!(messages[messages.len() - 1], ModuleFixSuccessful);
    }

    #[tokio::test]
    async fn multi_target_reaching_single_repair_is_refused() {
        let f = fixture();
        let mut other = page_target();
        other.target_id = TargetId::new(13);
        let task = queued_task(&f.queue, vec![page_target(), other]).await;

        let outcome = f.surgeon.operate(&diagnosis(task, &[])).await.unwrap();

        assert_eq!(outcome.messages(), &[MultiTargetTask, ModuleFixFailed]);
    }

    #[tokio::test]
    async fn target_without_id_is_refused() {
        let f = fixture();
        seed_module(&f.store).await;
        let before = f.store.tables().await;
        let task = DeleteTask::from_parts(
            TaskId::new(5),
            json!({"targets": [{"container": 3}]}),
            None,
            vec![],
            vec![TargetEntry::default()],
        )
        .unwrap();

        let outcome = f
            .surgeon
            .operate(&diagnosis(task, &[SymptomKind::TargetIdMissing]))
            .await
            .unwrap();

        assert_eq!(outcome.messages(), &[TargetIdNotFound, ModuleFixFailed]);
        assert_eq!(f.store.tables().await, before);
    }

    #[tokio::test]
    async fn split_reports_entries_without_id() {
        let f = fixture();
        seed_module(&f.store).await;
        let payload = json!({"targets": [page_target().to_entry(), {"container": 3}]});
        let job = JobRecord::new("course_delete_modules", Some(ActorId::new(2)), payload.clone(), now());
        let id = f.queue.enqueue(job).await.unwrap();
        let task = DeleteTask::from_parts(
            id,
            payload,
            Some(ActorId::new(2)),
            vec![page_target()],
            vec![TargetEntry::default()],
        )
        .unwrap();

        let outcome = f
            .surgeon
            .operate(&diagnosis(task, &[SymptomKind::MultiTarget]))
            .await
            .unwrap();

        assert_eq!(
            outcome.messages(),
            &[
                SplitIntoIndividualTask(TargetId::new(12)),
                TargetIdNotFound,
                OldTaskDeleted,
                TaskFixSuccessful,
            ]
        );
        assert_eq!(f.queue.jobs().await.len(), 1);
    }

    #[tokio::test]
    async fn split_queues_one_task_per_target_and_drops_the_original() {
        let f = fixture();
        seed_module(&f.store).await;
        let mut gone = page_target();
        gone.target_id = TargetId::new(13);
        gone.instance_id = Some(InstanceId::new(41));
        let task = queued_task(&f.queue, vec![page_target(), gone]).await;

        let outcome = f
            .surgeon
            .operate(&diagnosis(task.clone(), &[SymptomKind::MultiTarget]))
            .await
            .unwrap();

        assert_eq!(
            outcome.messages(),
            &[
                SplitIntoIndividualTask(TargetId::new(12)),
                SplitIntoIndividualTask(TargetId::new(13)),
                OldTaskDeleted,
                TaskFixSuccessful,
            ]
        );
        assert!(f.queue.get(task.task_id()).await.is_none());

        let jobs = f.queue.jobs().await;
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].actor_id, Some(ActorId::new(2)));
        assert_eq!(jobs[0].payload["targets"][0]["id"], 12);
        assert_eq!(jobs[0].payload["targets"][0]["deletion_in_progress"], true);
        assert_eq!(jobs[1].payload["targets"][0]["instance"], 41);
        assert_eq!(jobs[0].payload["real_actor_id"], 2);
        assert_eq!(f.store.rows("course_modules").await[0]["deletioninprogress"], 1);
    }

    #[tokio::test]
    async fn split_with_vanished_original_fails_without_success() {
        let f = fixture();
        let mut second = page_target();
        second.target_id = TargetId::new(13);
        let task = DeleteTask::new(
            TaskId::new(404),
            json!({}),
            None,
            vec![page_target(), second],
        )
        .unwrap();

        let outcome = f
            .surgeon
            .operate(&diagnosis(task, &[SymptomKind::MultiTarget]))
            .await
            .unwrap();

        assert_eq!(
            outcome.messages(),
            &[
                SplitIntoIndividualTask(TargetId::new(12)),
                SplitIntoIndividualTask(TargetId::new(13)),
                OldTaskDeleteFailed,
                TaskFixFailed,
            ]
        );
        assert!(!outcome.is_success());
    }
}
