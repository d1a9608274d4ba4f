//! EventBus - 購読中のすべてのプロセッサにイベントを配る

use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::registration::Registration;
use crate::domain::{BusError, EventMessage};
use crate::ports::{IdGenerator, ProcessorRef, SharedEventProcessor, SystemClock, UlidGenerator};
use crate::registry::{ConcurrentSet, RegistryConfig, RegistryError};

/// Fans each published batch out to every processor subscribed at publish time.
pub struct EventBus {
    processors: Arc<ConcurrentSet<ProcessorRef>>,
    ids: Arc<dyn IdGenerator>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            processors: Arc::new(ConcurrentSet::new()),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }

    pub fn with_registry(config: &RegistryConfig) -> Result<Self, RegistryError> {
        Ok(Self {
            processors: Arc::new(ConcurrentSet::with_config(config)?),
            ..Self::new()
        })
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Subscribes `processor`. The same instance subscribed twice still receives each batch
    /// once, and cancelling either registration removes it.
    pub fn subscribe(&self, processor: SharedEventProcessor) -> Registration {
        let processor = ProcessorRef(processor);
        if self.processors.add(processor.clone()) {
            debug!("event processor subscribed");
        } else {
            debug!("event processor already subscribed");
        }

        let processors = Arc::clone(&self.processors);
        Registration::new(self.ids.subscription_id(), move || {
            let removed = processors.remove(&processor);
            if removed {
                debug!("event processor unsubscribed");
            }
            removed
        })
    }

    /// Hands `events` to every processor in a snapshot taken now, one processor at a time.
    ///
    /// A failing processor does not stop delivery to the rest; all failures come back
    /// together as `EventProcessingFailed`.
    pub async fn publish(&self, events: &[EventMessage]) -> Result<(), BusError> {
        let processors = self.processors.snapshot();
        trace!(
            events = events.len(),
            processors = processors.len(),
            "publishing events"
        );

        let mut failures = Vec::new();
        for ProcessorRef(processor) in processors {
            if let Err(error) = processor.process(events).await {
                warn!(error = %error, "event processor failed");
                failures.push(error);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BusError::EventProcessingFailed(failures))
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.processors.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
