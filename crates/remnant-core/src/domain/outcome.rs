//! Outcome model: the ordered log of what a repair did.
//!
//! Every corrective action, skip and failure is one `OutcomeMessage`.
//! Order is execution order; reports and tests rely on it.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::TargetId;
use super::task::DeleteTask;

/// Classification of a single message.
///
/// Serialized as SCREAMING_SNAKE_CASE: SUCCESS / FAILURE / ADVICE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    Failure,
    /// Nothing was changed; the operator has to act.
    Advice,
}

/// Cleanup steps that can fail without a dedicated message of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStep {
    StructureRebuild,
    ArtifactPurge,
    CalendarEvents,
    ScoringItems,
    Associations,
    Completion,
    Tags,
    ScopeDeletion,
    DeletedEvent,
}

impl fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CleanupStep::StructureRebuild => "course structure rebuild",
            CleanupStep::ArtifactPurge => "file cleanup",
            CleanupStep::CalendarEvents => "calendar event cleanup",
            CleanupStep::ScoringItems => "grade item cleanup",
            CleanupStep::Associations => "blog association cleanup",
            CleanupStep::Completion => "completion cleanup",
            CleanupStep::Tags => "tag cleanup",
            CleanupStep::ScopeDeletion => "context deletion",
            CleanupStep::DeletedEvent => "module deleted event",
        };
        f.write_str(text)
    }
}

/// One action taken (or refused) by the surgeon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message", content = "detail", rename_all = "snake_case")]
pub enum OutcomeMessage {
    // --- task level ---
    AdhocTaskAdvice,
    SplitIntoIndividualTask(TargetId),
    OldTaskDeleted,
    OldTaskDeleteFailed,
    TaskFixSuccessful,
    TaskFixFailed,

    // --- guards ---
    MultiTargetTask,
    TargetIdNotFound,
    ModuleFixFailed,

    // --- single-target cleanup ---
    StructuralDataFixed,
    EntityRecordNotFound,
    ArtifactRecordsDeleted,
    CalendarEventDeleted,
    ScoringRecordsDeleted,
    AssociationRecordsDeleted,
    CompletionRecordsDeleted,
    CompletionCriteriaRecordsDeleted,
    TagRecordsDeleted,
    ScopeRecordDeleted,
    EntityRecordDeleted,
    EntityRecordDeleteFailed,
    PlacementDataDeleted,
    PlacementDataDeleteFailed,
    TaskRescheduled,
    TaskRescheduleFailed,
    ModuleFixSuccessful,
    StepFailed(CleanupStep),
}

impl OutcomeMessage {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            OutcomeMessage::AdhocTaskAdvice => OutcomeKind::Advice,
            OutcomeMessage::OldTaskDeleteFailed
            | OutcomeMessage::TaskFixFailed
            | OutcomeMessage::MultiTargetTask
            | OutcomeMessage::TargetIdNotFound
            | OutcomeMessage::ModuleFixFailed
            | OutcomeMessage::EntityRecordDeleteFailed
            | OutcomeMessage::PlacementDataDeleteFailed
            | OutcomeMessage::TaskRescheduleFailed
            | OutcomeMessage::StepFailed(_) => OutcomeKind::Failure,
            // 見つからないのは修復の前提どおり
            _ => OutcomeKind::Success,
        }
    }
}

impl fmt::Display for OutcomeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeMessage::AdhocTaskAdvice => f.write_str(
                "Adhoc task record is missing: re-run the task split/requeue tool for this task manually",
            ),
            OutcomeMessage::SplitIntoIndividualTask(target) => {
                write!(f, "Module {target} separated into an individual task")
            }
            OutcomeMessage::OldTaskDeleted => f.write_str("Original multi-module task deleted"),
            OutcomeMessage::OldTaskDeleteFailed => {
                f.write_str("Original multi-module task could not be deleted")
            }
            OutcomeMessage::TaskFixSuccessful => f.write_str("Task fix successful"),
            OutcomeMessage::TaskFixFailed => f.write_str("Task fix failed"),
            OutcomeMessage::MultiTargetTask => f.write_str("Multiple modules in one delete task"),
            OutcomeMessage::TargetIdNotFound => f.write_str("Course module id not found"),
            OutcomeMessage::ModuleFixFailed => f.write_str("Module fix failed"),
            OutcomeMessage::StructuralDataFixed => f.write_str("Course section data fixed"),
            OutcomeMessage::EntityRecordNotFound => {
                f.write_str("Course module table record not found")
            }
            OutcomeMessage::ArtifactRecordsDeleted => f.write_str("File table records deleted"),
            OutcomeMessage::CalendarEventDeleted => f.write_str("Calendar event deleted"),
            OutcomeMessage::ScoringRecordsDeleted => f.write_str("Grade table records deleted"),
            OutcomeMessage::AssociationRecordsDeleted => {
                f.write_str("Blog association records deleted")
            }
            OutcomeMessage::CompletionRecordsDeleted => {
                f.write_str("Completion table records deleted")
            }
            OutcomeMessage::CompletionCriteriaRecordsDeleted => {
                f.write_str("Completion criteria table records deleted")
            }
            OutcomeMessage::TagRecordsDeleted => f.write_str("Tag table records deleted"),
            OutcomeMessage::ScopeRecordDeleted => f.write_str("Context table record deleted"),
            OutcomeMessage::EntityRecordDeleted => {
                f.write_str("Course module table record deleted")
            }
            OutcomeMessage::EntityRecordDeleteFailed => {
                f.write_str("Course module table record delete failed")
            }
            OutcomeMessage::PlacementDataDeleted => f.write_str("Course section data deleted"),
            OutcomeMessage::PlacementDataDeleteFailed => {
                f.write_str("Course section data delete failed")
            }
            OutcomeMessage::TaskRescheduled => f.write_str("Adhoc task rescheduled to run asap"),
            OutcomeMessage::TaskRescheduleFailed => {
                f.write_str("Adhoc task could not be found to reschedule")
            }
            OutcomeMessage::ModuleFixSuccessful => f.write_str("Module fix successful"),
            OutcomeMessage::StepFailed(step) => write!(f, "Step failed: {step}"),
        }
    }
}

/// A task together with the ordered messages of its repair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    task: DeleteTask,
    messages: Vec<OutcomeMessage>,
}

impl Outcome {
    pub fn new(task: DeleteTask, messages: Vec<OutcomeMessage>) -> Self {
        Self { task, messages }
    }

    pub fn task(&self) -> &DeleteTask {
        &self.task
    }

    pub fn messages(&self) -> &[OutcomeMessage] {
        &self.messages
    }

    /// The repair ran to one of its success terminals.
    pub fn is_success(&self) -> bool {
        matches!(
            self.messages.last(),
            Some(OutcomeMessage::TaskFixSuccessful | OutcomeMessage::ModuleFixSuccessful)
        )
    }

    pub fn failures(&self) -> impl Iterator<Item = &OutcomeMessage> {
        self.messages
            .iter()
            .filter(|m| m.kind() == OutcomeKind::Failure)
    }
}
