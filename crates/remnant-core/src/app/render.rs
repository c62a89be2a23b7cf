//! Render - 診断結果・修復結果のプレーンテキスト表示（CLI 用）
//!
//! 出力例:
//! ```text
//! Diagnosis task-7 (cm-12)
//!   Symptoms
//!     cm-12: Context table record missing
//!   Results
//!     Result messages
//!       [SUCCESS] Context table record deleted
//! ```

use std::fmt;

use super::reporter::{RunReport, TaskReport};
use crate::domain::{Diagnosis, Outcome, OutcomeKind, RemnantError, TaskId};

fn kind_label(kind: OutcomeKind) -> &'static str {
    match kind {
        OutcomeKind::Success => "SUCCESS",
        OutcomeKind::Failure => "FAILURE",
        OutcomeKind::Advice => "ADVICE",
    }
}

/// Heading line plus the symptom list.
struct DiagnosisText<'a>(&'a Diagnosis);

impl fmt::Display for DiagnosisText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let diagnosis = self.0;
        let targets = diagnosis
            .task()
            .target_ids()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "Diagnosis {} ({targets})", diagnosis.task().task_id())?;
        writeln!(f, "  Symptoms")?;
        if diagnosis.is_healthy() {
            writeln!(f, "    none")?;
        }
        for (key, kinds) in diagnosis.symptoms().iter() {
            for kind in kinds {
                writeln!(f, "    {key}: {kind}")?;
            }
        }
        Ok(())
    }
}

struct ResultsText<'a>(&'a Result<Outcome, RemnantError>);

impl fmt::Display for ResultsText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Results")?;
        writeln!(f, "    Result messages")?;
        match self.0 {
            Ok(outcome) => {
                for message in outcome.messages() {
                    writeln!(f, "      [{}] {message}", kind_label(message.kind()))?;
                }
            }
            Err(error) => writeln!(f, "      [FAILURE] {error}")?,
        }
        Ok(())
    }
}

struct TaskReportText<'a>(&'a TaskReport);

impl fmt::Display for TaskReportText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        match &report.diagnosis {
            Ok(diagnosis) => write!(f, "{}", DiagnosisText(diagnosis))?,
            Err(error) => failed_heading(f, report.task_id, error)?,
        }
        if let Some(outcome) = &report.outcome {
            write!(f, "{}", ResultsText(outcome))?;
        }
        Ok(())
    }
}

fn failed_heading(f: &mut fmt::Formatter<'_>, task_id: TaskId, error: &RemnantError) -> fmt::Result {
    writeln!(f, "Diagnosis {task_id} ()")?;
    writeln!(f, "  Error: {error}")
}

/// One task: diagnosis, then results when a repair ran.
pub fn task_report(report: &TaskReport) -> String {
    TaskReportText(report).to_string()
}

/// Every task that needs attention; empty when the run found nothing.
pub fn run_report(report: &RunReport) -> String {
    report
        .tasks
        .iter()
        .filter(|t| t.has_symptoms() || t.diagnosis.is_err() || t.outcome.is_some())
        .map(|t| format!("{}\n", TaskReportText(t)))
        .collect()
}
