//! 型付きハンドラ trait と、それを port trait に変換するアダプタ
//!
//! - **表層（Typed）**: `Handles<C>` / `Answers<Q>` / `Observes<E>` - 型安全
//! - **内部（Dyn）**: `CommandHandler` / `QueryHandler` / `EventProcessor` - object-safe
//!
//! アダプタはペイロード型が `NAME` と一致するかを `can_handle` で確認し、
//! serde でデコードしてから型付きハンドラを呼びます。

use async_trait::async_trait;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

use super::message::{Command, Event, Query};
use crate::domain::{CommandMessage, EventMessage, HandlerError, QueryMessage, Reply};
use crate::ports::{
    CommandHandler, EventProcessor, QueryHandler, SharedCommandHandler, SharedEventProcessor,
    SharedQueryHandler,
};

/// Handles commands of type `C`.
///
/// ```ignore
/// struct Charger;
///
/// #[async_trait]
/// impl Handles<ChargeCard> for Charger {
///     type Output = Receipt;
///
///     async fn handle(&self, command: ChargeCard) -> Result<Receipt, HandlerError> {
///         ...
///     }
/// }
/// ```
#[async_trait]
pub trait Handles<C: Command>: Send + Sync {
    type Output: Serialize + Send;

    async fn handle(&self, command: C) -> Result<Self::Output, HandlerError>;
}

/// Answers queries of type `Q`.
#[async_trait]
pub trait Answers<Q: Query>: Send + Sync {
    async fn answer(&self, query: Q) -> Result<Q::Response, HandlerError>;
}

/// Observes events of type `E`. Events of other types in a batch are skipped.
#[async_trait]
pub trait Observes<E: Event>: Send + Sync {
    async fn observe(&self, event: E, message: &EventMessage) -> Result<(), HandlerError>;
}

pub struct TypedCommandHandler<C, H> {
    handler: H,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Command, H: Handles<C>> TypedCommandHandler<C, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<C: Command, H: Handles<C>> CommandHandler for TypedCommandHandler<C, H> {
    async fn handle(&self, command: &CommandMessage) -> Result<Reply, HandlerError> {
        let payload: C = command.decode_payload()?;
        let output = self.handler.handle(payload).await?;
        Reply::json(&output)
    }

    fn can_handle(&self, command: &CommandMessage) -> bool {
        command.payload_type().as_str() == C::NAME
    }
}

pub struct TypedQueryHandler<Q, H> {
    handler: H,
    _marker: PhantomData<fn() -> Q>,
}

impl<Q: Query, H: Answers<Q>> TypedQueryHandler<Q, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<Q: Query, H: Answers<Q>> QueryHandler for TypedQueryHandler<Q, H> {
    async fn handle(&self, query: &QueryMessage) -> Result<Reply, HandlerError> {
        if query.payload_type().as_str() != Q::NAME {
            return Err(HandlerError::decode(format!(
                "expected {} payload, got {}",
                Q::NAME,
                query.payload_type()
            )));
        }
        let payload: Q = query.decode_payload()?;
        let response = self.handler.answer(payload).await?;
        Reply::json(&response)
    }
}

pub struct TypedEventProcessor<E, H> {
    handler: H,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Event, H: Observes<E>> TypedEventProcessor<E, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Event, H: Observes<E>> EventProcessor for TypedEventProcessor<E, H> {
    async fn process(&self, events: &[EventMessage]) -> Result<(), HandlerError> {
        for message in events.iter().filter(|m| m.payload_type().as_str() == E::NAME) {
            let event: E = message.decode_payload()?;
            self.handler.observe(event, message).await?;
        }
        Ok(())
    }
}

pub fn typed_command<C, H>(handler: H) -> SharedCommandHandler
where
    C: Command,
    H: Handles<C> + 'static,
{
    Arc::new(TypedCommandHandler::<C, H>::new(handler))
}

pub fn typed_query<Q, H>(handler: H) -> SharedQueryHandler
where
    Q: Query,
    H: Answers<Q> + 'static,
{
    Arc::new(TypedQueryHandler::<Q, H>::new(handler))
}

pub fn typed_event<E, H>(handler: H) -> SharedEventProcessor
where
    E: Event,
    H: Observes<E> + 'static,
{
    Arc::new(TypedEventProcessor::<E, H>::new(handler))
}
