//! バスへの型付き購読ヘルパー

use super::handler::{Answers, Handles, Observes, typed_command, typed_event, typed_query};
use super::message::{Command, Event, Query};
use crate::bus::{CommandBus, EventBus, QueryBus, Registration};
use crate::domain::{BusError, ResponseType};

impl CommandBus {
    /// Subscribes `handler` under `C::NAME`.
    pub fn subscribe_command<C, H>(&self, handler: H) -> Result<Registration, BusError>
    where
        C: Command,
        H: Handles<C> + 'static,
    {
        self.subscribe(C::NAME, typed_command::<C, H>(handler))
    }
}

impl QueryBus {
    /// Subscribes `handler` under `Q::NAME`, answering with `Q::Response`.
    pub fn subscribe_query<Q, H>(&self, handler: H) -> Registration
    where
        Q: Query,
        H: Answers<Q> + 'static,
    {
        self.subscribe(
            Q::NAME,
            ResponseType::instance_of::<Q::Response>(),
            typed_query::<Q, H>(handler),
        )
    }
}

impl EventBus {
    pub fn subscribe_event<E, H>(&self, handler: H) -> Registration
    where
        E: Event,
        H: Observes<E> + 'static,
    {
        self.subscribe(typed_event::<E, H>(handler))
    }
}

#[cfg(test)]
mod tests {
    use crate::bus::{CommandBus, QueryBus};
    use crate::domain::{CommandMessage, HandlerError, QueryMessage};
    use crate::typed::message::fixtures::*;
    use crate::typed::{Answers, Handles};
    use async_trait::async_trait;

    struct Counter;

    #[async_trait]
    impl Handles<Ping> for Counter {
        type Output = u32;

        async fn handle(&self, command: Ping) -> Result<u32, HandlerError> {
            Ok(command.seq + 1)
        }
    }

    struct Upper;

    #[async_trait]
    impl Answers<Lookup> for Upper {
        async fn answer(&self, query: Lookup) -> Result<String, HandlerError> {
            Ok(query.key.to_uppercase())
        }
    }

    #[tokio::test]
    async fn typed_command_through_bus() {
        let bus = CommandBus::new();
        bus.subscribe_command::<Ping, _>(Counter).unwrap();

        let message = CommandMessage::from_command(&Ping { seq: 41 }).unwrap();
        let result = bus.dispatch::<u32>(&message).await.unwrap();
        assert_eq!(result.into_payload(), Some(42));
    }

    #[tokio::test]
    async fn typed_query_through_bus() {
        let bus = QueryBus::new();
        bus.subscribe_query::<Lookup, _>(Upper);

        let query = QueryMessage::from_query(&Lookup { key: "ab".into() }).unwrap();
        let result = bus.query::<String>(&query).await.unwrap();
        assert_eq!(result.into_payload().as_deref(), Some("AB"));
    }
}
