//! AppBuilder - ポートを束ねて Reporter を組み立てる
//!
//! # 設計原則
//! - 起動時検証（Fail-fast）: 必須ポートが欠けていれば build() で止める
//! - 欠けているポートはまとめて報告する（1 つずつ直させない）
//! - Clock / RunIdGenerator / RepairConfig は省略時に既定値を使う

use std::sync::Arc;

use super::catalog::TaskCatalog;
use super::config::RepairConfig;
use super::diagnoser::Diagnoser;
use super::reporter::Reporter;
use super::surgeon::Surgeon;
use crate::domain::RemnantError;
use crate::ports::{
    Clock, EventSink, RecordStore, RunIdGenerator, SubsystemHooks, SystemClock, TaskQueue,
    UlidRunIdGenerator,
};

/// AppBuilder は Reporter を構築
///
/// # 使用例
/// ```ignore
/// let reporter = AppBuilder::new()
///     .with_queue(queue)
///     .with_store(store.clone())
///     .with_hooks(Arc::new(StoreBackedHooks::new(store)))
///     .with_events(Arc::new(RecordingEventSink::new()))
///     .build()?;
/// ```
#[derive(Default)]
pub struct AppBuilder {
    queue: Option<Arc<dyn TaskQueue>>,
    store: Option<Arc<dyn RecordStore>>,
    hooks: Option<Arc<dyn SubsystemHooks>>,
    events: Option<Arc<dyn EventSink>>,
    clock: Option<Arc<dyn Clock>>,
    run_ids: Option<Arc<dyn RunIdGenerator>>,
    config: RepairConfig,
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing ports: {0:?}. These must be provided before build().")]
    MissingPorts(Vec<&'static str>),

    #[error(transparent)]
    InvalidConfig(#[from] RemnantError),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SubsystemHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// 省略時は SystemClock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 省略時は Clock を使う UlidRunIdGenerator
    pub fn with_run_ids(mut self, run_ids: Arc<dyn RunIdGenerator>) -> Self {
        self.run_ids = Some(run_ids);
        self
    }

    pub fn with_config(mut self, config: RepairConfig) -> Self {
        self.config = config;
        self
    }

    /// # 検証
    /// - queue / store / hooks / events が全て設定されているか
    /// - RepairConfig::validate() が通るか
    pub fn build(self) -> Result<Reporter, BuildError> {
        let mut missing = Vec::new();
        if self.queue.is_none() {
            missing.push("queue");
        }
        if self.store.is_none() {
            missing.push("store");
        }
        if self.hooks.is_none() {
            missing.push("hooks");
        }
        if self.events.is_none() {
            missing.push("events");
        }
        let (Some(queue), Some(store), Some(hooks), Some(events)) =
            (self.queue, self.store, self.hooks, self.events)
        else {
            return Err(BuildError::MissingPorts(missing));
        };
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let run_ids = self
            .run_ids
            .unwrap_or_else(|| Arc::new(UlidRunIdGenerator::new(clock.clone())));

        let catalog = TaskCatalog::new(queue.clone(), store.clone(), self.config.clone());
        let diagnoser = Diagnoser::new(queue.clone(), store.clone(), self.config.clone());
        let surgeon = Surgeon::new(queue, store, hooks, events, clock, self.config);
        Ok(Reporter::new(catalog, diagnoser, surgeon, run_ids))
    }
}
