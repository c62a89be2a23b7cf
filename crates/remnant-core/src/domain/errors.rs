//! Errors - エラー型と分類
//!
//! 「レコードが存在しない」はエラーではなく症状（symptom）です。
//! ここに並ぶのは、診断や修復を続けられない失敗だけです。

use thiserror::Error;

use super::ids::{TargetId, TaskId};

/// ErrorKind は実行エラーの分類
///
/// - Infrastructure: ストアやキューに到達できない（診断をやり直す）
/// - Invalid: 入力やタスクの形が壊れている（このタスクは扱えない）
/// - Misuse: 呼び出し側の誤用（何も実行しない）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Infrastructure,
    Invalid,
    Misuse,
}

/// StoreError は record store port の失敗
#[derive(Debug, Error)]
#[error("record store failure on `{table}`: {message}")]
pub struct StoreError {
    pub table: String,
    pub message: String,
}

impl StoreError {
    pub fn new(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// QueueError は task queue port の失敗
#[derive(Debug, Error)]
#[error("task queue failure: {0}")]
pub struct QueueError(pub String);

/// RemnantError はドメインエラー
#[derive(Debug, Error)]
pub enum RemnantError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("cannot decode payload of {task_id}: {message}")]
    Decode { task_id: TaskId, message: String },

    #[error("{0} has no targets")]
    EmptyTask(TaskId),

    #[error("{0} not found in the queue")]
    TaskNotFound(TaskId),

    #[error("{target_id} is not a target of {task_id}")]
    TargetNotInTask { task_id: TaskId, target_id: TargetId },

    #[error("{0} has a single target, there is nothing to separate")]
    NotMultiTarget(TaskId),

    #[error("unknown action `{0}`")]
    UnknownAction(String),

    #[error("invalid value for `{field}`: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RemnantError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemnantError::Store(_) | RemnantError::Queue(_) => ErrorKind::Infrastructure,
            RemnantError::Decode { .. }
            | RemnantError::EmptyTask(_)
            | RemnantError::TaskNotFound(_)
            | RemnantError::TargetNotInTask { .. }
            | RemnantError::NotMultiTarget(_) => ErrorKind::Invalid,
            RemnantError::UnknownAction(_)
            | RemnantError::InvalidField { .. }
            | RemnantError::Config(_) => ErrorKind::Misuse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_infrastructure() {
        let err: RemnantError = StoreError::new("context", "connection reset").into();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(err.to_string().contains("`context`"));
    }

    #[test]
    fn empty_task_is_invalid() {
        let err = RemnantError::EmptyTask(TaskId::new(9));
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(err.to_string(), "task-9 has no targets");
    }
}
