//! Reporter - カタログ → 診断 → 修復 をまとめて実行するファサード
//!
//! CLI と Web の両方がここを通ります。
//!
//! # 設計原則
//! - タスクは 1 件ずつ順番に処理する（並列化しない）
//! - あるタスクの失敗は記録して次のタスクへ進む
//! - 実行ごとに RunId を払い出してログを相関させる

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{Instrument, info, info_span, warn};

use super::catalog::{TaskCatalog, TaskFilter};
use super::diagnoser::Diagnoser;
use super::surgeon::Surgeon;
use crate::domain::{DeleteTask, Diagnosis, Outcome, RemnantError, RunId, TargetId, TaskId};
use crate::ports::RunIdGenerator;

/// What happened to one task during a run.
#[derive(Debug)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub diagnosis: Result<Diagnosis, RemnantError>,
    /// `None` when no repair was attempted.
    pub outcome: Option<Result<Outcome, RemnantError>>,
}

impl TaskReport {
    fn diagnosed(task_id: TaskId, diagnosis: Result<Diagnosis, RemnantError>) -> Self {
        Self {
            task_id,
            diagnosis,
            outcome: None,
        }
    }

    /// Diagnosed with at least one symptom.
    pub fn has_symptoms(&self) -> bool {
        self.diagnosis.as_ref().is_ok_and(|d| !d.is_healthy())
    }

    /// Something in this task could not be completed.
    pub fn is_failure(&self) -> bool {
        match (&self.diagnosis, &self.outcome) {
            (Err(_), _) => true,
            (Ok(_), Some(Err(_))) => true,
            (Ok(_), Some(Ok(outcome))) => !outcome.is_success(),
            (Ok(_), None) => false,
        }
    }
}

/// All task reports of one run, in task id order.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub tasks: Vec<TaskReport>,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks with at least one symptom.
    pub fn symptomatic(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|t| t.has_symptoms())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|t| t.is_failure())
    }
}

/// An operator action posted from the report page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Run the repair for one target of a task.
    FixModule { task_id: TaskId, target_id: TargetId },
    /// Split a multi-target task into single-target tasks.
    SeparateModule { task_id: TaskId },
}

impl Action {
    /// Parse the posted form fields (`action`, `taskid`, `cmid`).
    pub fn from_form(fields: &BTreeMap<String, String>) -> Result<Self, RemnantError> {
        let action = fields.get("action").map(String::as_str).unwrap_or_default();
        match action {
            "fix_module" => Ok(Action::FixModule {
                task_id: TaskId::new(int_field(fields, "taskid")?),
                target_id: TargetId::new(int_field(fields, "cmid")?),
            }),
            "separate_module" => Ok(Action::SeparateModule {
                task_id: TaskId::new(int_field(fields, "taskid")?),
            }),
            other => Err(RemnantError::UnknownAction(other.to_string())),
        }
    }

    pub fn task_id(&self) -> TaskId {
        match self {
            Action::FixModule { task_id, .. } | Action::SeparateModule { task_id } => *task_id,
        }
    }
}

fn int_field(fields: &BTreeMap<String, String>, field: &'static str) -> Result<u64, RemnantError> {
    let value = fields.get(field).map(String::as_str).unwrap_or_default();
    value.trim().parse().map_err(|_| RemnantError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// Reporter は診断・修復の実行窓口
pub struct Reporter {
    catalog: TaskCatalog,
    diagnoser: Diagnoser,
    surgeon: Surgeon,
    run_ids: Arc<dyn RunIdGenerator>,
}

impl Reporter {
    pub fn new(
        catalog: TaskCatalog,
        diagnoser: Diagnoser,
        surgeon: Surgeon,
        run_ids: Arc<dyn RunIdGenerator>,
    ) -> Self {
        Self {
            catalog,
            diagnoser,
            surgeon,
            run_ids,
        }
    }

    /// Diagnose every matching task. Read-only.
    pub async fn diagnose(&self, filter: &TaskFilter) -> Result<RunReport, RemnantError> {
        let run_id = self.run_ids.generate_run_id();
        let span = info_span!("diagnose", %run_id);
        async {
            let tasks = self.catalog.load(filter).await?;
            info!(tasks = tasks.len(), "diagnosing");
            let mut reports = Vec::with_capacity(tasks.len());
            for (task_id, task) in tasks {
                reports.push(TaskReport::diagnosed(task_id, self.diagnoser.diagnose(&task).await));
            }
            Ok(RunReport {
                run_id,
                tasks: reports,
            })
        }
        .instrument(span)
        .await
    }

    /// Diagnose every matching task and repair the ones with symptoms.
    pub async fn fix(&self, filter: &TaskFilter) -> Result<RunReport, RemnantError> {
        let run_id = self.run_ids.generate_run_id();
        let span = info_span!("fix", %run_id);
        async {
            let tasks = self.catalog.load(filter).await?;
            info!(tasks = tasks.len(), "fixing");
            let mut reports = Vec::with_capacity(tasks.len());
            for (_, task) in tasks {
                reports.push(self.fix_task(&task, false).await);
            }
            let failed = reports.iter().filter(|r| r.is_failure()).count();
            if failed > 0 {
                warn!(failed, "some tasks could not be fixed");
            }
            Ok(RunReport {
                run_id,
                tasks: reports,
            })
        }
        .instrument(span)
        .await
    }

    /// Run one operator action.
    pub async fn handle(&self, action: Action) -> Result<TaskReport, RemnantError> {
        let run_id = self.run_ids.generate_run_id();
        let span = info_span!("action", %run_id, ?action);
        async {
            let task = self.catalog.get(action.task_id()).await?;
            match action {
                Action::FixModule { task_id, target_id } if task.target(target_id).is_none() => {
                    return Err(RemnantError::TargetNotInTask { task_id, target_id });
                }
                // A single-target task would fall through to the cleanup.
                Action::SeparateModule { task_id } if !task.is_multi_target() => {
                    return Err(RemnantError::NotMultiTarget(task_id));
                }
                _ => {}
            }
            Ok(self.fix_task(&task, true).await)
        }
        .instrument(span)
        .await
    }

    /// Diagnose, then operate when there is something to fix (or `force`).
    async fn fix_task(&self, task: &DeleteTask, force: bool) -> TaskReport {
        let task_id = task.task_id();
        let diagnosis = match self.diagnoser.diagnose(task).await {
            Ok(diagnosis) => diagnosis,
            Err(error) => {
                warn!(%task_id, %error, "diagnosis failed");
                return TaskReport::diagnosed(task_id, Err(error));
            }
        };
        if diagnosis.is_healthy() && !force {
            return TaskReport::diagnosed(task_id, Ok(diagnosis));
        }
        let outcome = self.surgeon.operate(&diagnosis).await;
        if let Err(error) = &outcome {
            warn!(%task_id, %error, "repair aborted");
        }
        TaskReport {
            task_id,
            diagnosis: Ok(diagnosis),
            outcome: Some(outcome),
        }
    }
}
