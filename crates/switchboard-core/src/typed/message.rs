//! Command / Query / Event trait - 型とメッセージ名の対応付け
//!
//! # Trait Bounds
//! - `Serialize + DeserializeOwned`: ペイロード（`serde_json::Value`）との相互変換
//! - `Send + Sync + 'static`: ハンドラの Future に載せて `Arc` に格納できるため

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{CommandMessage, EventMessage, Message, QueryMessage, ResponseType};
use crate::ports::Clock;

/// A command type and the name it is routed by.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct ChargeCard { amount: u64 }
///
/// impl Command for ChargeCard {
///     const NAME: &'static str = "billing.charge_card.v1";
/// }
/// ```
///
/// # 命名規約
/// - `{domain}.{action}.v{major}`
pub trait Command: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;
}

/// A query type, its name, and the single response type it expects.
pub trait Query: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;

    type Response: Serialize + DeserializeOwned + Send + 'static;
}

pub trait Event: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;
}

impl CommandMessage {
    /// Serializes `command`; name and payload type are both `C::NAME`.
    pub fn from_command<C: Command>(command: &C) -> Result<Self, serde_json::Error> {
        Ok(Self::from_message(Message::from_payload(C::NAME, command)?, C::NAME))
    }
}

impl QueryMessage {
    /// Serializes `query`, expecting a single `Q::Response`.
    pub fn from_query<Q: Query>(query: &Q) -> Result<Self, serde_json::Error> {
        Ok(Self::from_message(
            Message::from_payload(Q::NAME, query)?,
            Q::NAME,
            ResponseType::instance_of::<Q::Response>(),
        ))
    }
}

impl EventMessage {
    pub fn from_event<E: Event>(event: &E) -> Result<Self, serde_json::Error> {
        Ok(Self::from_message(Message::from_payload(E::NAME, event)?, chrono::Utc::now()))
    }

    /// Like `from_event`, stamped by `clock`.
    pub fn from_event_at<E: Event>(event: &E, clock: &dyn Clock) -> Result<Self, serde_json::Error> {
        Ok(Self::from_message(Message::from_payload(E::NAME, event)?, clock.now()))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    #[test]
    fn command_message_uses_type_name() {
        let message = CommandMessage::from_command(&Ping { seq: 3 }).unwrap();
        assert_eq!(message.command_name(), Ping::NAME);
        assert_eq!(message.payload_type().as_str(), Ping::NAME);
        assert_eq!(message.decode_payload::<Ping>().unwrap(), Ping { seq: 3 });
    }

    #[test]
    fn query_message_expects_response_type() {
        let message = QueryMessage::from_query(&Lookup { key: "a".into() }).unwrap();
        assert_eq!(message.query_name(), Lookup::NAME);
        assert_eq!(*message.response_type(), ResponseType::instance_of::<String>());
    }

    #[test]
    fn event_message_takes_clock_time() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let message = EventMessage::from_event_at(&Ticked { n: 1 }, &FixedClock::new(at)).unwrap();
        assert_eq!(message.timestamp(), at);
        assert_eq!(message.payload_type().as_str(), Ticked::NAME);
    }
}
