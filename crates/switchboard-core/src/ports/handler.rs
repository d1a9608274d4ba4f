//! Handler ports - バスが呼び出す object-safe なハンドラ trait
//!
//! バスは `Arc<dyn ...>` として保持します。同一性（重複排除・解除）は
//! `Arc` のアドレスで判定するので、同じハンドラを二度購読しても一つとして扱われます。

use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::domain::{CommandMessage, EventMessage, HandlerError, QueryMessage, Reply};

/// Handles commands routed to it by name.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: &CommandMessage) -> Result<Reply, HandlerError>;

    /// Capability check evaluated before `handle`. Declining makes the dispatch fail with
    /// "no handler".
    fn can_handle(&self, _command: &CommandMessage) -> bool {
        true
    }
}

/// Answers queries. One query name may have many handlers.
#[async_trait]
pub trait QueryHandler: Send + Sync {
    async fn handle(&self, query: &QueryMessage) -> Result<Reply, HandlerError>;
}

/// Receives every published batch of events.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    async fn process(&self, events: &[EventMessage]) -> Result<(), HandlerError>;
}

pub type SharedCommandHandler = Arc<dyn CommandHandler>;
pub type SharedQueryHandler = Arc<dyn QueryHandler>;
pub type SharedEventProcessor = Arc<dyn EventProcessor>;

/// Whether two handles point at the same handler instance.
pub fn same_handler<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

pub(crate) fn hash_handler<T: ?Sized, H: Hasher>(handler: &Arc<T>, state: &mut H) {
    Arc::as_ptr(handler).cast::<()>().hash(state);
}

/// An event processor keyed by identity, so the event bus can deduplicate it.
#[derive(Clone)]
pub(crate) struct ProcessorRef(pub(crate) SharedEventProcessor);

impl PartialEq for ProcessorRef {
    fn eq(&self, other: &Self) -> bool {
        same_handler(&self.0, &other.0)
    }
}

impl Eq for ProcessorRef {}

impl Hash for ProcessorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_handler(&self.0, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Noop;

    #[async_trait]
    impl EventProcessor for Noop {
        async fn process(&self, _events: &[EventMessage]) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn identity_is_by_instance() {
        let a: SharedEventProcessor = Arc::new(Noop);
        let b: SharedEventProcessor = Arc::new(Noop);

        assert!(same_handler(&a, &a.clone()));
        assert!(!same_handler(&a, &b));

        let refs: HashSet<ProcessorRef> = [a.clone(), a, b].into_iter().map(ProcessorRef).collect();
        assert_eq!(refs.len(), 2);
    }
}
