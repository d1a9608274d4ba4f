//! switchboard-core
//!
//! In-process messaging: command, query and event buses over concurrent registries.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, metadata, message, result, response_type, errors）
//! - **registry**: ロックストライプ方式の ConcurrentSet / ConcurrentMap
//! - **ports**: 抽象化レイヤー（ハンドラ, DuplicateResolver, CommandCallback, Clock, IdGenerator）
//! - **bus**: CommandBus / QueryBus / EventBus と Registration
//! - **typed**: 型付きメッセージ API（Command, Query, Event と Handles, Answers, Observes）
//! - **impls**: 実装（クロージャハンドラ, 解決ポリシー, コールバック）
//! - **app**: 設定と MessagingBuilder

pub mod app;
pub mod bus;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod registry;
pub mod typed;

pub use crate::app::{Messaging, MessagingBuilder, MessagingConfig};
pub use crate::bus::{CommandBus, EventBus, QueryBus, Registration};
pub use crate::domain::{
    BusError, CommandMessage, EventMessage, HandlerError, QueryMessage, Reply, ResultMessage,
};
