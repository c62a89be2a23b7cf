//! Symptoms: the closed catalog of anomalies a partial deletion leaves behind.
//!
//! Branching always happens on `SymptomKind`. The operator-facing text is
//! produced by `Display` and never read back.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::TargetId;

/// One detected anomaly.
///
/// Task-level kinds come first in the enum; `is_task_level()` tells the two
/// groups apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymptomKind {
    /// The queue no longer has a record for the task.
    AdhocRecordMissing,

    /// The task still bundles more than one target.
    MultiTarget,

    /// The task's only target entry carries no id.
    TargetIdMissing,

    /// The target's kind is unknown, or its kind-specific row is gone.
    KindRecordMissing,

    /// The generic dependent-entity row (course module) is gone.
    ContainerRecordMissing,

    /// The access-scope (context) row is gone.
    ScopeRecordMissing,

    /// The target is not listed in its placement (section).
    PlacementRecordMissing,
}

impl SymptomKind {
    pub fn is_task_level(self) -> bool {
        matches!(
            self,
            SymptomKind::AdhocRecordMissing | SymptomKind::MultiTarget | SymptomKind::TargetIdMissing
        )
    }

    /// Stable machine label (used as JSON key and in logs).
    pub fn label(self) -> &'static str {
        match self {
            SymptomKind::AdhocRecordMissing => "adhoc-record-missing",
            SymptomKind::MultiTarget => "multi-target",
            SymptomKind::TargetIdMissing => "target-id-missing",
            SymptomKind::KindRecordMissing => "kind-record-missing",
            SymptomKind::ContainerRecordMissing => "container-record-missing",
            SymptomKind::ScopeRecordMissing => "scope-record-missing",
            SymptomKind::PlacementRecordMissing => "placement-record-missing",
        }
    }
}

impl fmt::Display for SymptomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SymptomKind::AdhocRecordMissing => "Adhoc task record missing from the task queue",
            SymptomKind::MultiTarget => "Multiple modules in one delete task",
            SymptomKind::TargetIdMissing => "Course module id missing from the delete task",
            SymptomKind::KindRecordMissing => "Module type table record missing",
            SymptomKind::ContainerRecordMissing => "Course module table record missing",
            SymptomKind::ScopeRecordMissing => "Context table record missing",
            SymptomKind::PlacementRecordMissing => "Course section table record missing",
        };
        f.write_str(text)
    }
}

/// What a group of symptoms is about: the task itself, or one of its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "key", rename_all = "snake_case")]
pub enum SymptomKey {
    Task(SymptomKind),
    Target(TargetId),
}

impl fmt::Display for SymptomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymptomKey::Task(kind) => f.write_str(kind.label()),
            SymptomKey::Target(target_id) => target_id.fmt(f),
        }
    }
}

/// Insertion-ordered mapping `SymptomKey → [SymptomKind]`.
///
/// # 不変条件
/// - merge は追記のみ（既存の症状を上書きしない）
/// - キーは最初に現れた順
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomSet {
    entries: Vec<(SymptomKey, Vec<SymptomKind>)>,
}

impl SymptomSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a task-level symptom (keyed by itself).
    pub fn task(kind: SymptomKind) -> Self {
        let mut set = Self::new();
        set.push(SymptomKey::Task(kind), kind);
        set
    }

    /// Append one symptom under `key`.
    pub fn push(&mut self, key: SymptomKey, kind: SymptomKind) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, kinds)) => kinds.push(kind),
            None => self.entries.push((key, vec![kind])),
        }
    }

    /// Append every symptom of `other`, key by key.
    pub fn merge(&mut self, other: SymptomSet) {
        for (key, kinds) in other.entries {
            for kind in kinds {
                self.push(key, kind);
            }
        }
    }

    pub fn get(&self, key: &SymptomKey) -> Option<&[SymptomKind]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, kinds)| kinds.as_slice())
    }

    pub fn for_target(&self, target_id: TargetId) -> &[SymptomKind] {
        self.get(&SymptomKey::Target(target_id)).unwrap_or(&[])
    }

    pub fn has_task_symptom(&self, kind: SymptomKind) -> bool {
        self.get(&SymptomKey::Task(kind)).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SymptomKey, &[SymptomKind])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &SymptomKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
