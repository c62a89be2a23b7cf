//! App - アプリケーション層
//!
//! ports を組み合わせて診断・修復のロジックを実装します。
//!
//! # 主要コンポーネント
//! - **TaskCatalog**: キューから削除タスクを読み出す
//! - **Diagnoser**: 症状の検出（読み取り専用）
//! - **Surgeon**: 症状に応じた修復
//! - **Reporter**: 上の 3 つをまとめた実行窓口（CLI / Web アクション）
//! - **AppBuilder**: ポートのワイヤリングと起動時検証

pub mod builder;
pub mod catalog;
pub mod config;
pub mod diagnoser;
pub mod render;
pub mod reporter;
pub mod surgeon;

// 主要な型を再エクスポート
pub use self::builder::{AppBuilder, BuildError};
pub use self::catalog::{TaskCatalog, TaskFilter, TargetResolver};
pub use self::config::RepairConfig;
pub use self::diagnoser::Diagnoser;
pub use self::reporter::{Action, Reporter, RunReport, TaskReport};
pub use self::surgeon::Surgeon;
