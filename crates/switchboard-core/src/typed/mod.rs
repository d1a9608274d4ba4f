//! Typed - 型付きメッセージ API
//!
//! メッセージ名の typo を型で排除し、ハンドラとの対応付けを静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Command` / `Query` / `Event` trait と `Handles` / `Answers` / `Observes`
//! - **内部（Dyn）**: `ports` の object-safe なハンドラ trait（JSON ペイロード）

pub mod handler;
pub mod message;
mod subscribe;

// 主要な trait/型 を再エクスポート
pub use self::handler::{
    Answers, Handles, Observes, TypedCommandHandler, TypedEventProcessor, TypedQueryHandler,
    typed_command, typed_event, typed_query,
};
pub use self::message::{Command, Event, Query};
