//! Implementations - 開発・テスト用の実装
//!
//! ports で定義した trait の in-memory 実装を提供します。
//! キューの実装は `queue` モジュールにあります。

pub mod event_sink;
pub mod memory_store;
pub mod snapshot;
pub mod store_hooks;

pub use self::event_sink::RecordingEventSink;
pub use self::memory_store::InMemoryRecordStore;
pub use self::snapshot::{Snapshot, SnapshotError};
pub use self::store_hooks::StoreBackedHooks;
