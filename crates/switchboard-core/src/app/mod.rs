//! App - アプリケーション層
//!
//! 設定（JSON）を読み込み、三つのバスを構築してハンドラを購読させます。
//!
//! # 主要コンポーネント
//! - **MessagingConfig**: レジストリと重複ポリシーの設定
//! - **MessagingBuilder**: 構築とワイヤリング（起動時検証つき）
//! - **Messaging**: 構築済みのバス一式

pub mod builder;
pub mod config;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, Messaging, MessagingBuilder};
pub use self::config::{CommandBusConfig, ConfigError, DuplicatePolicy, MessagingConfig};
