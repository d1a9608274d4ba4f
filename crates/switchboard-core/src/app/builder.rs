//! MessagingBuilder - 三つのバスの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - `expect_commands()` / `expect_queries()` で必須の名前を登録
//! - `build()` 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - 不足があれば BuildError を返す

use std::sync::Arc;
use tracing::info;

use super::config::MessagingConfig;
use crate::bus::{CommandBus, EventBus, QueryBus, Registration};
use crate::domain::{BusError, ResponseType};
use crate::ports::{SharedCommandHandler, SharedEventProcessor, SharedQueryHandler};
use crate::registry::RegistryError;
use crate::typed::{
    Answers, Command, Event, Handles, Observes, Query, typed_command, typed_event, typed_query,
};

/// MessagingBuilder はバス一式を構築
///
/// # 使用例
/// ```ignore
/// let messaging = MessagingBuilder::new()
///     .with_config(MessagingConfig::from_path("switchboard.json")?)
///     .register_command::<ChargeCard, _>(Charger)
///     .register_query::<FindInvoice, _>(Invoices)
///     .expect_commands(&[ChargeCard::NAME])
///     .build()?;
/// ```
pub struct MessagingBuilder {
    config: MessagingConfig,
    commands: Vec<(String, SharedCommandHandler)>,
    queries: Vec<(String, ResponseType, SharedQueryHandler)>,
    processors: Vec<SharedEventProcessor>,
    expected_commands: Option<Vec<String>>,
    expected_queries: Option<Vec<String>>,
}

/// BuildError はバス構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing command handlers: {0:?}. These commands were expected but not registered.")]
    MissingCommandHandlers(Vec<String>),

    #[error("Missing query handlers: {0:?}. These queries were expected but not registered.")]
    MissingQueryHandlers(Vec<String>),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("subscription failed: {0}")]
    Subscription(#[from] BusError),
}

impl MessagingBuilder {
    pub fn new() -> Self {
        Self {
            config: MessagingConfig::default(),
            commands: Vec::new(),
            queries: Vec::new(),
            processors: Vec::new(),
            expected_commands: None,
            expected_queries: None,
        }
    }

    pub fn with_config(mut self, config: MessagingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register_command<C: Command, H: Handles<C> + 'static>(self, handler: H) -> Self {
        self.command_handler(C::NAME, typed_command::<C, H>(handler))
    }

    pub fn register_query<Q: Query, H: Answers<Q> + 'static>(self, handler: H) -> Self {
        self.query_handler(
            Q::NAME,
            ResponseType::instance_of::<Q::Response>(),
            typed_query::<Q, H>(handler),
        )
    }

    pub fn register_event<E: Event, H: Observes<E> + 'static>(self, handler: H) -> Self {
        self.event_processor(typed_event::<E, H>(handler))
    }

    /// Untyped registration, e.g. for closure handlers.
    pub fn command_handler(mut self, name: impl Into<String>, handler: SharedCommandHandler) -> Self {
        self.commands.push((name.into(), handler));
        self
    }

    pub fn query_handler(
        mut self,
        name: impl Into<String>,
        response_type: ResponseType,
        handler: SharedQueryHandler,
    ) -> Self {
        self.queries.push((name.into(), response_type, handler));
        self
    }

    pub fn event_processor(mut self, processor: SharedEventProcessor) -> Self {
        self.processors.push(processor);
        self
    }

    /// 期待されるコマンド名のリストを設定
    pub fn expect_commands(mut self, names: &[&str]) -> Self {
        self.expected_commands = Some(names.iter().map(|name| name.to_string()).collect());
        self
    }

    /// 期待されるクエリ名のリストを設定
    pub fn expect_queries(mut self, names: &[&str]) -> Self {
        self.expected_queries = Some(names.iter().map(|name| name.to_string()).collect());
        self
    }

    /// Checks the expectations, builds the buses and subscribes every registered handler.
    ///
    /// Registration order is kept, so with the default policy a later command handler for
    /// the same name replaces an earlier one.
    pub fn build(self) -> Result<Messaging, BuildError> {
        let missing_commands = missing(
            self.expected_commands.as_deref(),
            self.commands.iter().map(|(name, _)| name),
        );
        if !missing_commands.is_empty() {
            return Err(BuildError::MissingCommandHandlers(missing_commands));
        }
        let missing_queries = missing(
            self.expected_queries.as_deref(),
            self.queries.iter().map(|(name, _, _)| name),
        );
        if !missing_queries.is_empty() {
            return Err(BuildError::MissingQueryHandlers(missing_queries));
        }

        let registry = &self.config.registry;
        let command_bus = self
            .config
            .command_bus
            .duplicate_policy
            .configure(CommandBus::builder().registry(registry.clone()))
            .build()?;
        let query_bus = QueryBus::with_registry(registry)?;
        let event_bus = EventBus::with_registry(registry)?;

        let mut registrations = Vec::new();
        for (name, handler) in self.commands {
            registrations.push(command_bus.subscribe(name, handler)?);
        }
        for (name, response_type, handler) in self.queries {
            registrations.push(query_bus.subscribe(name, response_type, handler));
        }
        for processor in self.processors {
            registrations.push(event_bus.subscribe(processor));
        }

        info!(
            commands = command_bus.subscribed_commands().len(),
            queries = query_bus.subscriptions().len(),
            event_processors = event_bus.subscriber_count(),
            "messaging wired"
        );

        Ok(Messaging {
            command_bus: Arc::new(command_bus),
            query_bus: Arc::new(query_bus),
            event_bus: Arc::new(event_bus),
            registrations,
        })
    }
}

fn missing<'a>(expected: Option<&[String]>, registered: impl Iterator<Item = &'a String>) -> Vec<String> {
    let Some(expected) = expected else {
        return Vec::new();
    };
    let registered: Vec<&String> = registered.collect();
    expected
        .iter()
        .filter(|name| !registered.contains(name))
        .cloned()
        .collect()
}

impl Default for MessagingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The wired buses plus the registrations made while building them.
pub struct Messaging {
    command_bus: Arc<CommandBus>,
    query_bus: Arc<QueryBus>,
    event_bus: Arc<EventBus>,
    registrations: Vec<Registration>,
}

impl Messaging {
    pub fn command_bus(&self) -> &Arc<CommandBus> {
        &self.command_bus
    }

    pub fn query_bus(&self) -> &Arc<QueryBus> {
        &self.query_bus
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Cancels every registration made by the builder; returns how many were still active.
    pub fn unsubscribe_all(&self) -> usize {
        self.registrations
            .iter()
            .filter(|registration| registration.cancel())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::DuplicatePolicy;
    use crate::domain::{CommandMessage, HandlerError, Reply};
    use crate::impls::command_handler_fn;
    use crate::typed::message::fixtures::*;
    use async_trait::async_trait;

    struct PingHandler;

    #[async_trait]
    impl Handles<Ping> for PingHandler {
        type Output = String;

        async fn handle(&self, _command: Ping) -> Result<String, HandlerError> {
            Ok("Pong".to_string())
        }
    }

    #[test]
    fn build_success() {
        let messaging = MessagingBuilder::new()
            .register_command::<Ping, _>(PingHandler)
            .expect_commands(&[Ping::NAME])
            .build();
        assert!(messaging.is_ok());
    }

    #[test]
    fn build_missing_commands() {
        let messaging = MessagingBuilder::new()
            .register_command::<Ping, _>(PingHandler)
            .expect_commands(&[Ping::NAME, Shout::NAME])
            .build();
        assert!(matches!(
            messaging,
            Err(BuildError::MissingCommandHandlers(missing)) if missing == vec![Shout::NAME.to_string()]
        ));
    }

    #[test]
    fn build_missing_queries() {
        let messaging = MessagingBuilder::new().expect_queries(&[Lookup::NAME]).build();
        assert!(matches!(messaging, Err(BuildError::MissingQueryHandlers(_))));
    }

    #[test]
    fn build_checks_commands_then_queries() {
        let messaging = MessagingBuilder::new()
            .register_command::<Ping, _>(PingHandler)
            .expect_commands(&[Ping::NAME])
            .expect_queries(&[Lookup::NAME])
            .build();
        assert!(matches!(
            messaging,
            Err(BuildError::MissingQueryHandlers(missing)) if missing == vec![Lookup::NAME.to_string()]
        ));
    }

    #[test]
    fn build_without_expectations() {
        assert!(MessagingBuilder::new().build().is_ok());
    }

    #[test]
    fn invalid_registry_config_fails() {
        let mut config = MessagingConfig::default();
        config.registry.concurrency_level = Some(0);
        let messaging = MessagingBuilder::new().with_config(config).build();
        assert!(matches!(messaging, Err(BuildError::Registry(_))));
    }

    #[test]
    fn reject_policy_surfaces_duplicate_registration() {
        let mut config = MessagingConfig::default();
        config.command_bus.duplicate_policy = DuplicatePolicy::Reject;
        let messaging = MessagingBuilder::new()
            .with_config(config)
            .register_command::<Ping, _>(PingHandler)
            .register_command::<Ping, _>(PingHandler)
            .build();
        assert!(matches!(
            messaging,
            Err(BuildError::Subscription(BusError::DuplicateSubscriptionRejected { .. }))
        ));
    }

    #[tokio::test]
    async fn wired_buses_dispatch_and_unsubscribe() {
        let messaging = MessagingBuilder::new()
            .register_command::<Ping, _>(PingHandler)
            .command_handler("raw", command_handler_fn(|_| async { Ok(Reply::empty()) }))
            .build()
            .unwrap();

        let ping = CommandMessage::from_command(&Ping { seq: 1 }).unwrap();
        let result = messaging.command_bus().dispatch::<String>(&ping).await.unwrap();
        assert_eq!(result.into_payload().as_deref(), Some("Pong"));

        assert_eq!(messaging.unsubscribe_all(), 2);
        assert_eq!(messaging.unsubscribe_all(), 0);
        assert!(messaging.command_bus().subscribed_commands().is_empty());
    }
}
