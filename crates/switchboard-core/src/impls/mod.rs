//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **fn_handler**: async クロージャ → ハンドラ
//! - **resolution**: 二重購読の解決ポリシー
//! - **callback**: NoOpCallback / LoggingCallback
//!
//! Clock と IdGenerator の実装は ports 側（`ports::clock`, `ports::id_generator`）にあります。

pub mod callback;
pub mod fn_handler;
pub mod resolution;

// 主要な型を再エクスポート
pub use self::callback::{LoggingCallback, NoOpCallback};
pub use self::fn_handler::{command_handler_fn, event_processor_fn, query_handler_fn};
pub use self::resolution::{
    LogAndOverride, RejectDuplicates, SilentOverride, log_and_override, reject_duplicates,
    silent_override,
};
