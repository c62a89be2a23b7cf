//! Domain identifiers (strongly-typed IDs).
//!
//! 外部ストア（record store / task queue）が払い出す数値 ID をそのまま保持します。
//! Phantom type パターンで `TaskId` と `TargetId` などの取り違えをコンパイル時に防ぎます。
//!
//! ## Phantom Type パターン
//! `Id<T>` というジェネリック型で共通実装を提供しつつ、
//! `T` は実行時には使わない（PhantomData）マーカー型として、
//! コンパイル時の型安全性を提供します。
//!
//! ## RunId
//! レポーターの 1 回の実行を識別する ID だけは ULID です（ログの相関用）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"task-", "cm-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    /// Display で使うプレフィックス
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// serde ではただの数値として扱います（キューの payload と互換）。
///
/// # 例
/// ```ignore
/// let task_id = TaskId::new(7);
/// let target_id = TargetId::new(7);
/// // task_id と target_id は異なる型なので、混同できない
/// ```
#[repr(transparent)]
#[derive(Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Id<T: IdMarker> {
    value: u64,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub const fn new(value: u64) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    /// 内部の数値を取得
    pub const fn get(&self) -> u64 {
        self.value
    }
}

// derive だと T にも境界が付いてしまうので手書きする
impl<T: IdMarker> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: IdMarker> Copy for Id<T> {}

impl<T: IdMarker> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: IdMarker> Eq for Id<T> {}

impl<T: IdMarker> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: IdMarker> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T: IdMarker> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T: IdMarker> From<u64> for Id<T> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(
    /// 削除タスク（キューのジョブ）のマーカー型
    Task,
    "task-"
);
id_marker!(
    /// 削除対象（course module）のマーカー型
    Target,
    "cm-"
);
id_marker!(
    /// 対象を所有する集約（course）のマーカー型
    Container,
    "course-"
);
id_marker!(
    /// 対象の種類（module type）のマーカー型
    Kind,
    "kind-"
);
id_marker!(
    /// 配置（section）のマーカー型
    Placement,
    "section-"
);
id_marker!(
    /// 種類別テーブル内のインスタンスのマーカー型
    Instance,
    "instance-"
);
id_marker!(
    /// アクセス範囲（context）のマーカー型
    Scope,
    "context-"
);
id_marker!(
    /// タスクを投入したユーザーのマーカー型
    Actor,
    "user-"
);

// ========================================
// Type Alias（使いやすさのため）
// ========================================

/// Identifier of a queued deletion job.
pub type TaskId = Id<Task>;

/// Identifier of a dependent entity slated for deletion.
pub type TargetId = Id<Target>;

/// Identifier of the aggregate owning a target.
pub type ContainerId = Id<Container>;

/// Identifier of a target's sub-type.
pub type KindId = Id<Kind>;

/// Identifier of a target's structural placement.
pub type PlacementId = Id<Placement>;

/// Identifier of a target inside its kind-specific table.
pub type InstanceId = Id<Instance>;

/// Identifier of an access-scope (context) record.
pub type ScopeId = Id<Scope>;

/// Identifier of the user a job runs as.
pub type ActorId = Id<Actor>;

/// Identifier of one reporter run (check or fix pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(Ulid);

impl RunId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}
