//! IdGenerator port - ID 生成の抽象化
//!
//! バスは購読ごとに `SubscriptionId` をここから払い出します。
//!
//! # 実装
//! - **UlidGenerator**: Clock の時刻 + ランダム部分からなる ULID

use crate::domain::ids::{IdMarker, SubscriptionId};
use crate::domain::Id;
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は購読 ID を生成
///
/// メッセージ ID はここを通らず、`MessageId::generate()` でメッセージ自身が払い出します。
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    fn subscription_id(&self) -> SubscriptionId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// 時刻部分は Clock から取るので、FixedClock を渡せばタイムスタンプが固定されます。
#[derive(Debug, Clone, Default)]
pub struct UlidGenerator<C: Clock> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next<T: IdMarker>(&self) -> Id<T> {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Id::from_ulid(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn subscription_id(&self) -> SubscriptionId {
        self.next()
    }
}
