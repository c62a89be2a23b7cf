//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 診断・修復エンジンは外部のジョブキューとレコードストアを直接触らず、
//! ここの trait 越しにだけアクセスします（テストでは in-memory 実装に差し替え）。

pub mod clock;
pub mod event_sink;
pub mod hooks;
pub mod id_generator;
pub mod record_store;
pub mod task_queue;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{EventSink, EventSinkError};
pub use self::hooks::{PlacementRemovalFailed, SubsystemHooks, placement_removal};
pub use self::id_generator::{RunIdGenerator, UlidRunIdGenerator};
pub use self::record_store::{Filter, RecordStore, Row, schema};
pub use self::task_queue::TaskQueue;
