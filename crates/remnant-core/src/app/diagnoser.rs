//! Diagnoser - 削除タスクの症状を検出する（読み取り専用）
//!
//! # 検出順序
//! 1. AdhocRecordMissing: キューにジョブが無い → 以降は調べない
//! 2. MultiTarget: 対象が複数 → 対象ごとの検査はしない
//! 3. TargetIdMissing: 唯一の対象エントリに id が無い → 引けるレコードが無い
//! 4. 対象ごと（タスクレベルの症状が無いときだけ）
//!    - KindRecordMissing → ContainerRecordMissing → ScopeRecordMissing
//!      → PlacementRecordMissing の順に積み上げる
//!
//! ストアの読み取り失敗は症状ではなくエラーとして返します。

use std::sync::Arc;

use tracing::debug;

use super::config::RepairConfig;
use crate::domain::{
    DeleteTask, Diagnosis, PlacementId, RemnantError, StoreError, SymptomKey, SymptomKind,
    SymptomSet, TargetDescriptor,
};
use crate::ports::record_store::{Filter, RecordStore, Row, field_u64, schema};
use crate::ports::TaskQueue;

/// Diagnoser は Diagnosis を生成
pub struct Diagnoser {
    queue: Arc<dyn TaskQueue>,
    store: Arc<dyn RecordStore>,
    config: RepairConfig,
}

impl Diagnoser {
    pub fn new(queue: Arc<dyn TaskQueue>, store: Arc<dyn RecordStore>, config: RepairConfig) -> Self {
        Self {
            queue,
            store,
            config,
        }
    }

    pub async fn diagnose(&self, task: &DeleteTask) -> Result<Diagnosis, RemnantError> {
        let task_id = task.task_id();

        let queued = self
            .queue
            .list_jobs(&self.config.task_kind, Some(&[task_id]), None)
            .await?;
        if queued.is_empty() {
            debug!(%task_id, "queue record missing");
            return Ok(Diagnosis::new(
                task.clone(),
                SymptomSet::task(SymptomKind::AdhocRecordMissing),
            ));
        }

        if task.is_multi_target() {
            debug!(%task_id, targets = task.target_count(), "multi-target task");
            return Ok(Diagnosis::new(
                task.clone(),
                SymptomSet::task(SymptomKind::MultiTarget),
            ));
        }

        if task.first_target().is_none() {
            debug!(%task_id, "target entry without id");
            return Ok(Diagnosis::new(
                task.clone(),
                SymptomSet::task(SymptomKind::TargetIdMissing),
            ));
        }

        let mut symptoms = SymptomSet::new();
        for target in task.targets() {
            for kind in self.target_symptoms(target).await? {
                symptoms.push(SymptomKey::Target(target.target_id), kind);
            }
        }
        debug!(%task_id, symptoms = symptoms.len(), "task diagnosed");
        Ok(Diagnosis::new(task.clone(), symptoms))
    }

    async fn target_symptoms(&self, target: &TargetDescriptor) -> Result<Vec<SymptomKind>, StoreError> {
        let mut found = Vec::new();

        if !self.kind_record_exists(target).await? {
            found.push(SymptomKind::KindRecordMissing);
        }

        let live = self
            .store
            .get(schema::TARGETS, &Filter::id(target.target_id.get()))
            .await?;
        if live.is_none() {
            found.push(SymptomKind::ContainerRecordMissing);
        }

        let scope = Filter::new()
            .eq(schema::SCOPE_LEVEL, self.config.scope_level)
            .eq(schema::SCOPE_INSTANCE, target.target_id.get());
        if !self.store.exists(schema::SCOPES, &scope).await? {
            found.push(SymptomKind::ScopeRecordMissing);
        }

        if let Some(row) = &live
            && !self.listed_in_placement(target, row).await?
        {
            found.push(SymptomKind::PlacementRecordMissing);
        }

        Ok(found)
    }

    /// The kind-specific table has a row for the target's instance.
    async fn kind_record_exists(&self, target: &TargetDescriptor) -> Result<bool, StoreError> {
        let (Some(kind_name), Some(instance)) = (&target.kind_name, target.instance_id) else {
            return Ok(false);
        };
        self.store
            .exists(kind_name, &Filter::id(instance.get()))
            .await
    }

    /// A live target is listed by the placement it points at.
    ///
    /// Targets with no known placement are not checked.
    async fn listed_in_placement(&self, target: &TargetDescriptor, live: &Row) -> Result<bool, StoreError> {
        let placement = field_u64(live, schema::TARGET_PLACEMENT)
            .map(PlacementId::new)
            .or(target.placement_id);
        let Some(placement) = placement else {
            return Ok(true);
        };
        let Some(row) = self
            .store
            .get(schema::PLACEMENTS, &Filter::id(placement.get()))
            .await?
        else {
            return Ok(false);
        };
        let listed = row
            .get(schema::PLACEMENT_SEQUENCE)
            .and_then(|v| v.as_array())
            .is_some_and(|ids| ids.iter().any(|id| id.as_u64() == Some(target.target_id.get())));
        Ok(listed)
    }
}
