//! EventSink port - イベント記録の抽象化
//!
//! 修復パスが発行する `DomainEvent` の送り先です。
//! 実装: `impls::RecordingEventSink`（記録してログに出す）

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::DomainEvent;

#[derive(Debug, Error)]
#[error("event sink rejected `{event}`: {message}")]
pub struct EventSinkError {
    pub event: &'static str,
    pub message: String,
}

/// EventSink はドメインイベントを記録
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: DomainEvent) -> Result<(), EventSinkError>;
}
