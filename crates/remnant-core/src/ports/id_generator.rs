//! RunIdGenerator port - 実行 ID 生成の抽象化
//!
//! レポーターの 1 回の実行（check / fix）ごとに RunId を払い出し、
//! ログの相関に使います。テスト容易性のために trait として抽象化しています。
//!
//! # 実装
//! - **UlidRunIdGenerator**: ULID ベース（本番用）

use crate::domain::RunId;
use crate::ports::Clock;
use ulid::Ulid;

/// RunIdGenerator は実行 ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait RunIdGenerator: Send + Sync {
    fn generate_run_id(&self) -> RunId;
}

/// UlidRunIdGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// これにより、テスト時に FixedClock を使って timestamp 部分を固定できます。
pub struct UlidRunIdGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidRunIdGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> RunIdGenerator for UlidRunIdGenerator<C> {
    fn generate_run_id(&self) -> RunId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        RunId::from_ulid(ulid)
    }
}
