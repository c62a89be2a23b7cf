//! Diagnosis: a task together with the symptoms found on it.

use serde::{Deserialize, Serialize};

use super::symptom::{SymptomKind, SymptomSet};
use super::task::DeleteTask;

/// Produced once per task by the diagnoser, consumed once by the surgeon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    task: DeleteTask,
    symptoms: SymptomSet,
}

impl Diagnosis {
    pub fn new(task: DeleteTask, symptoms: SymptomSet) -> Self {
        Self { task, symptoms }
    }

    pub fn task(&self) -> &DeleteTask {
        &self.task
    }

    pub fn symptoms(&self) -> &SymptomSet {
        &self.symptoms
    }

    /// No symptom anywhere: the task only needs to run.
    pub fn is_healthy(&self) -> bool {
        self.symptoms.is_empty()
    }

    pub fn is_multi_target(&self) -> bool {
        self.task.is_multi_target()
    }

    /// Whether `kind` was found on the task or on any of its targets.
    pub fn has(&self, kind: SymptomKind) -> bool {
        self.symptoms.iter().any(|(_, kinds)| kinds.contains(&kind))
    }
}
