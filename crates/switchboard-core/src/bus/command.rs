//! CommandBus - コマンド名ごとにハンドラを一つだけ持つバス
//!
//! # 処理フロー
//! 1. `command_name` でハンドラを引く（ロックなし）
//! 2. ハンドラがいない、または `can_handle` が false なら `NoHandlerForCommand`
//! 3. ハンドラを実行し、結果を `ResultMessage` にまとめる
//!    - ハンドラのエラーは失敗結果として返す（呼び出し側には raise しない）

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use super::registration::Registration;
use crate::domain::{BusError, CommandMessage, ResultMessage};
use crate::impls::{NoOpCallback, SilentOverride};
use crate::ports::{
    CommandCallback, DuplicateResolver, IdGenerator, SharedCommandHandler, SystemClock,
    UlidGenerator,
};
use crate::registry::{ConcurrentMap, RegistryConfig, RegistryError};

/// Routes each command to the single handler subscribed under its name.
pub struct CommandBus {
    subscriptions: Arc<ConcurrentMap<String, SharedCommandHandler>>,
    resolver: Arc<dyn DuplicateResolver>,
    default_callback: Arc<dyn CommandCallback>,
    ids: Arc<dyn IdGenerator>,
}

impl CommandBus {
    /// Newest-wins duplicates, no-op callback, default registry sizing.
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(ConcurrentMap::new()),
            resolver: Arc::new(SilentOverride),
            default_callback: Arc::new(NoOpCallback),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }

    pub fn builder() -> CommandBusBuilder {
        CommandBusBuilder::default()
    }

    /// Subscribes `handler` to `command_name`.
    ///
    /// If the name is taken, the duplicate resolver decides what stays. A rejection leaves
    /// the existing handler in place and surfaces as `DuplicateSubscriptionRejected`.
    /// Cancelling the returned registration removes the name, whichever handler holds it.
    pub fn subscribe(
        &self,
        command_name: impl Into<String>,
        handler: SharedCommandHandler,
    ) -> Result<Registration, BusError> {
        let command_name = command_name.into();
        let resolver = &self.resolver;
        self.subscriptions
            .add_or_update(
                command_name.clone(),
                || Ok(handler.clone()),
                |name, registered| resolver.resolve(name, registered, &handler),
            )
            .map_err(|rejection| BusError::rejected(command_name.clone(), rejection))?;
        debug!(command_name = %command_name, "command handler subscribed");

        let subscriptions = Arc::clone(&self.subscriptions);
        Ok(Registration::new(self.ids.subscription_id(), move || {
            let removed = subscriptions.remove(&command_name).is_some();
            if removed {
                debug!(command_name = %command_name, "command handler unsubscribed");
            }
            removed
        }))
    }

    /// Dispatches `command` and decodes the handler's payload into `R`.
    ///
    /// Only a missing (or declining) handler is an `Err`; a failing handler yields a
    /// failed `ResultMessage`.
    pub async fn dispatch<R: DeserializeOwned>(
        &self,
        command: &CommandMessage,
    ) -> Result<ResultMessage<R>, BusError> {
        Ok(self.handle(command).await?.decode())
    }

    /// Dispatches without a result for the caller; the outcome goes to the default callback
    /// once the handler has finished.
    pub async fn send(&self, command: &CommandMessage) -> Result<(), BusError> {
        self.dispatch_with(command, self.default_callback.as_ref()).await
    }

    /// Like `send`, with a caller-supplied callback.
    pub async fn dispatch_with(
        &self,
        command: &CommandMessage,
        callback: &dyn CommandCallback,
    ) -> Result<(), BusError> {
        let result = self.handle(command).await?;
        callback.on_result(command, &result);
        Ok(())
    }

    pub fn has_handler(&self, command_name: &str) -> bool {
        self.subscriptions.contains_key(command_name)
    }

    /// Names with an active handler, sorted.
    pub fn subscribed_commands(&self) -> Vec<String> {
        let mut names = self.subscriptions.keys();
        names.sort();
        names
    }

    async fn handle(&self, command: &CommandMessage) -> Result<ResultMessage<Value>, BusError> {
        let handler = self
            .subscriptions
            .get(command.command_name())
            .filter(|handler| handler.can_handle(command))
            .ok_or_else(|| BusError::no_handler_for_command(command.command_name()))?;

        trace!(
            command_name = command.command_name(),
            message_id = %command.id(),
            "dispatching command"
        );
        Ok(match handler.handle(command).await {
            Ok(reply) => ResultMessage::from_reply(reply),
            Err(error) => {
                debug!(
                    command_name = command.command_name(),
                    error = %error,
                    "command handler failed"
                );
                ResultMessage::failure(error)
            }
        })
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBus")
            .field("commands", &self.subscribed_commands())
            .finish()
    }
}

/// Builder for `CommandBus`.
pub struct CommandBusBuilder {
    resolver: Arc<dyn DuplicateResolver>,
    default_callback: Arc<dyn CommandCallback>,
    ids: Arc<dyn IdGenerator>,
    registry: RegistryConfig,
}

impl Default for CommandBusBuilder {
    fn default() -> Self {
        Self {
            resolver: Arc::new(SilentOverride),
            default_callback: Arc::new(NoOpCallback),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            registry: RegistryConfig::default(),
        }
    }
}

impl CommandBusBuilder {
    pub fn duplicate_resolver(mut self, resolver: impl DuplicateResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn default_callback(mut self, callback: impl CommandCallback + 'static) -> Self {
        self.default_callback = Arc::new(callback);
        self
    }

    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn registry(mut self, config: RegistryConfig) -> Self {
        self.registry = config;
        self
    }

    pub fn build(self) -> Result<CommandBus, RegistryError> {
        Ok(CommandBus {
            subscriptions: Arc::new(ConcurrentMap::with_config(&self.registry)?),
            resolver: self.resolver,
            default_callback: self.default_callback,
            ids: self.ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DuplicateRejected, HandlerError, MetaData, Reply};
    use crate::impls::{command_handler_fn, reject_duplicates};
    use crate::ports::CommandHandler;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    fn replying(value: &'static str) -> SharedCommandHandler {
        command_handler_fn(move |_| async move { Ok(Reply::from(json!(value))) })
    }

    fn ping() -> CommandMessage {
        CommandMessage::new("Ping", json!({}))
    }

    #[tokio::test]
    async fn dispatch_returns_handler_payload() {
        let bus = CommandBus::new();
        bus.subscribe("Ping", replying("Pong")).unwrap();

        let result = bus.dispatch::<String>(&ping()).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.payload().map(String::as_str), Some("Pong"));
    }

    #[tokio::test]
    async fn cancel_removes_handler() {
        let bus = CommandBus::new();
        let registration = bus.subscribe("Ping", replying("Pong")).unwrap();

        assert!(registration.cancel());
        assert!(!registration.cancel());
        let err = bus.dispatch::<String>(&ping()).await.unwrap_err();
        assert!(matches!(err, BusError::NoHandlerForCommand { command_name } if command_name == "Ping"));
    }

    #[tokio::test]
    async fn handler_error_is_captured() {
        let bus = CommandBus::new();
        bus.subscribe("Ping", command_handler_fn(|_| async { Err(HandlerError::new("fail")) }))
            .unwrap();

        let result = bus.dispatch::<String>(&ping()).await.unwrap();
        assert!(!result.is_success());
        assert_eq!(result.exception(), Some(&HandlerError::new("fail")));
    }

    #[tokio::test]
    async fn newest_subscription_wins_by_default() {
        let bus = CommandBus::new();
        bus.subscribe("Ping", replying("first")).unwrap();
        bus.subscribe("Ping", replying("second")).unwrap();

        let result = bus.dispatch::<String>(&ping()).await.unwrap();
        assert_eq!(result.into_payload().as_deref(), Some("second"));
        assert_eq!(bus.subscribed_commands(), vec!["Ping".to_string()]);
    }

    #[tokio::test]
    async fn rejecting_policy_keeps_existing() {
        let bus = CommandBus::builder()
            .duplicate_resolver(reject_duplicates())
            .build()
            .unwrap();
        bus.subscribe("Ping", replying("first")).unwrap();

        let err = bus.subscribe("Ping", replying("second")).unwrap_err();
        assert!(matches!(err, BusError::DuplicateSubscriptionRejected { .. }));

        let result = bus.dispatch::<String>(&ping()).await.unwrap();
        assert_eq!(result.into_payload().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn resolver_may_install_a_third_handler() {
        let bus = CommandBus::builder()
            .duplicate_resolver(
                |_: &str,
                 _: &SharedCommandHandler,
                 _: &SharedCommandHandler|
                 -> Result<SharedCommandHandler, DuplicateRejected> { Ok(replying("merged")) },
            )
            .build()
            .unwrap();
        bus.subscribe("Ping", replying("first")).unwrap();
        bus.subscribe("Ping", replying("second")).unwrap();

        let result = bus.dispatch::<String>(&ping()).await.unwrap();
        assert_eq!(result.into_payload().as_deref(), Some("merged"));
    }

    #[tokio::test]
    async fn cancel_removes_name_even_after_override() {
        let bus = CommandBus::new();
        let first = bus.subscribe("Ping", replying("first")).unwrap();
        bus.subscribe("Ping", replying("second")).unwrap();

        assert!(first.cancel());
        assert!(!bus.has_handler("Ping"));
    }

    struct Picky;

    #[async_trait]
    impl CommandHandler for Picky {
        async fn handle(&self, _command: &CommandMessage) -> Result<Reply, HandlerError> {
            Ok(Reply::empty())
        }

        fn can_handle(&self, command: &CommandMessage) -> bool {
            command.metadata().contains_key("allowed")
        }
    }

    #[tokio::test]
    async fn declining_handler_counts_as_missing() {
        let bus = CommandBus::new();
        bus.subscribe("Ping", Arc::new(Picky)).unwrap();

        let err = bus.dispatch::<Value>(&ping()).await.unwrap_err();
        assert!(matches!(err, BusError::NoHandlerForCommand { .. }));

        let allowed = ping().with_metadata(MetaData::with("allowed", true));
        let result = bus.dispatch::<Value>(&allowed).await.unwrap();
        assert!(result.is_success());
        assert!(result.payload().is_none());
    }

    #[tokio::test]
    async fn send_feeds_default_callback() {
        let seen: Arc<Mutex<Vec<(String, bool)>>> = Arc::default();
        let sink = seen.clone();
        let bus = CommandBus::builder()
            .default_callback(move |command: &CommandMessage, result: &ResultMessage<Value>| {
                sink.lock()
                    .push((command.command_name().to_string(), result.is_success()));
            })
            .build()
            .unwrap();
        bus.subscribe("Ping", replying("Pong")).unwrap();

        bus.send(&ping()).await.unwrap();
        assert_eq!(*seen.lock(), vec![("Ping".to_string(), true)]);
    }

    #[tokio::test]
    async fn send_without_handler_raises() {
        let bus = CommandBus::new();
        let err = bus.send(&ping()).await.unwrap_err();
        assert!(matches!(err, BusError::NoHandlerForCommand { .. }));
    }

    #[tokio::test]
    async fn reply_result_keeps_metadata() {
        let bus = CommandBus::new();
        bus.subscribe(
            "Ping",
            command_handler_fn(|_| async {
                Ok(Reply::from(
                    ResultMessage::success(Some(json!("Pong")))
                        .with_metadata(MetaData::with("trace", "t-1")),
                ))
            }),
        )
        .unwrap();

        let result = bus.dispatch::<String>(&ping()).await.unwrap();
        assert_eq!(result.metadata().get("trace"), Some(&json!("t-1")));
        assert_eq!(result.into_payload().as_deref(), Some("Pong"));
    }
}
