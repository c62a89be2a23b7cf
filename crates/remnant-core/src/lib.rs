//! remnant-core
//!
//! 途中で止まったモジュール削除タスクの診断・修復エンジン。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, payload, symptom, diagnosis, outcome, events, errors）
//! - **ports**: 抽象化レイヤー（TaskQueue, RecordStore, SubsystemHooks, EventSink, Clock, RunIdGenerator）
//! - **queue**: in-memory のジョブキューと RetryPolicy
//! - **impls**: 実装（InMemoryRecordStore, StoreBackedHooks, RecordingEventSink, Snapshot）
//! - **app**: アプリケーションロジック（catalog, diagnoser, surgeon, reporter, builder）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;
