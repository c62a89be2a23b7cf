//! RecordingEventSink - 発行されたイベントを記録する EventSink

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::DomainEvent;
use crate::ports::{EventSink, EventSinkError};

/// Keeps every emitted event in memory and logs it.
#[derive(Clone, Default)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event: DomainEvent) -> Result<(), EventSinkError> {
        info!(event = event.name(), ?event, "domain event");
        self.events.lock().await.push(event);
        Ok(())
    }
}
