//! Ports - 抽象化レイヤー
//!
//! バスが外部から受け取るものはすべてここの trait を通します。
//! - ハンドラ（Command / Query / Event）
//! - 二重購読の解決ポリシー、コマンド結果のコールバック
//! - 時刻と ID の生成

pub mod callback;
pub mod clock;
pub mod handler;
pub mod id_generator;
pub mod resolver;

// 主要な trait を再エクスポート
pub use self::callback::CommandCallback;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub(crate) use self::handler::{ProcessorRef, hash_handler};
pub use self::handler::{
    CommandHandler, EventProcessor, QueryHandler, SharedCommandHandler, SharedEventProcessor,
    SharedQueryHandler, same_handler,
};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::resolver::DuplicateResolver;
