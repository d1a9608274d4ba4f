//! Closure adapters - async クロージャをハンドラとして購読するためのラッパー
//!
//! クロージャはメッセージの所有コピーを受け取るので、返す Future は
//! 借用を持ち越しません。

use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::domain::{CommandMessage, EventMessage, HandlerError, QueryMessage, Reply};
use crate::ports::{
    CommandHandler, EventProcessor, QueryHandler, SharedCommandHandler, SharedEventProcessor,
    SharedQueryHandler,
};

pub struct FnCommandHandler<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> CommandHandler for FnCommandHandler<F, Fut>
where
    F: Fn(CommandMessage) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Reply, HandlerError>> + Send,
{
    async fn handle(&self, command: &CommandMessage) -> Result<Reply, HandlerError> {
        (self.f)(command.clone()).await
    }
}

/// Wraps an async closure as a command handler.
///
/// ```ignore
/// let pong = command_handler_fn(|_cmd| async { Ok(Reply::from(json!("Pong"))) });
/// bus.subscribe("Ping", pong)?;
/// ```
pub fn command_handler_fn<F, Fut>(f: F) -> SharedCommandHandler
where
    F: Fn(CommandMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
{
    Arc::new(FnCommandHandler {
        f,
        _marker: PhantomData,
    })
}

pub struct FnQueryHandler<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> QueryHandler for FnQueryHandler<F, Fut>
where
    F: Fn(QueryMessage) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Reply, HandlerError>> + Send,
{
    async fn handle(&self, query: &QueryMessage) -> Result<Reply, HandlerError> {
        (self.f)(query.clone()).await
    }
}

pub fn query_handler_fn<F, Fut>(f: F) -> SharedQueryHandler
where
    F: Fn(QueryMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
{
    Arc::new(FnQueryHandler {
        f,
        _marker: PhantomData,
    })
}

pub struct FnEventProcessor<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> EventProcessor for FnEventProcessor<F, Fut>
where
    F: Fn(Vec<EventMessage>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn process(&self, events: &[EventMessage]) -> Result<(), HandlerError> {
        (self.f)(events.to_vec()).await
    }
}

pub fn event_processor_fn<F, Fut>(f: F) -> SharedEventProcessor
where
    F: Fn(Vec<EventMessage>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnEventProcessor {
        f,
        _marker: PhantomData,
    })
}
