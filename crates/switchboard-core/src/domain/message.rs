//! Message envelopes: the shared `Message` fields plus one concrete struct per kind.
//!
//! Every kind holds a `Message` directly and adds its routing field
//! (`command_name`, `timestamp`, `query_name` + `response_type`). Metadata
//! operations return new instances and never touch the identifier.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::errors::HandlerError;
use super::ids::MessageId;
use super::metadata::MetaData;
use super::response_type::ResponseType;

/// Name of the payload's type, e.g. `"billing.charge.v1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadType(String);

impl PayloadType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PayloadType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PayloadType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// The fields every message carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    metadata: MetaData,
    payload: Option<Value>,
    payload_type: PayloadType,
}

impl Message {
    pub fn new(payload_type: impl Into<PayloadType>, payload: Option<Value>) -> Self {
        Self::with_id(MessageId::generate(), payload_type, payload, MetaData::EMPTY)
    }

    /// Builds a message around an existing identifier (e.g. when rehydrating).
    pub fn with_id(
        id: MessageId,
        payload_type: impl Into<PayloadType>,
        payload: Option<Value>,
        metadata: MetaData,
    ) -> Self {
        Self {
            id,
            metadata,
            payload,
            payload_type: payload_type.into(),
        }
    }

    /// Serializes `payload` and wraps it.
    pub fn from_payload<T: Serialize>(
        payload_type: impl Into<PayloadType>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(payload_type, Some(serde_json::to_value(payload)?)))
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn payload_type(&self) -> &PayloadType {
        &self.payload_type
    }

    pub fn into_payload(self) -> Option<Value> {
        self.payload
    }

    /// Decodes the payload into `T`; an absent payload decodes as JSON `null`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        let value = self.payload.clone().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| HandlerError::decode(format!("{} payload decode: {e}", self.payload_type)))
    }

    /// A copy whose metadata is replaced by `metadata`.
    pub fn with_metadata(&self, metadata: MetaData) -> Self {
        Self {
            metadata,
            ..self.clone()
        }
    }

    /// A copy whose metadata is merged with `metadata` (new entries win).
    pub fn and_metadata(&self, metadata: &MetaData) -> Self {
        Self {
            metadata: self.metadata.merged_with(metadata),
            ..self.clone()
        }
    }
}

macro_rules! delegate_message_fields {
    ($kind:ty) => {
        impl $kind {
            pub fn message(&self) -> &Message {
                &self.message
            }

            pub fn id(&self) -> MessageId {
                self.message.id()
            }

            pub fn metadata(&self) -> &MetaData {
                self.message.metadata()
            }

            pub fn payload(&self) -> Option<&Value> {
                self.message.payload()
            }

            pub fn payload_type(&self) -> &PayloadType {
                self.message.payload_type()
            }

            pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
                self.message.decode_payload()
            }

            pub fn with_metadata(&self, metadata: MetaData) -> Self {
                Self {
                    message: self.message.with_metadata(metadata),
                    ..self.clone()
                }
            }

            pub fn and_metadata(&self, metadata: &MetaData) -> Self {
                Self {
                    message: self.message.and_metadata(metadata),
                    ..self.clone()
                }
            }
        }
    };
}

/// A command: routed by `command_name` to exactly one handler.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMessage {
    message: Message,
    command_name: String,
}

impl CommandMessage {
    /// The command name doubles as the payload type.
    pub fn new(command_name: impl Into<String>, payload: Value) -> Self {
        let command_name = command_name.into();
        Self {
            message: Message::new(command_name.as_str(), Some(payload)),
            command_name,
        }
    }

    pub fn from_message(message: Message, command_name: impl Into<String>) -> Self {
        Self {
            message,
            command_name: command_name.into(),
        }
    }

    pub fn command_name(&self) -> &str {
        &self.command_name
    }
}

delegate_message_fields!(CommandMessage);

/// An event: broadcast to every subscribed processor.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    message: Message,
    timestamp: DateTime<Utc>,
}

impl EventMessage {
    pub fn new(payload_type: impl Into<PayloadType>, payload: Value) -> Self {
        Self::from_message(Message::new(payload_type, Some(payload)), Utc::now())
    }

    pub fn from_message(message: Message, timestamp: DateTime<Utc>) -> Self {
        Self { message, timestamp }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

delegate_message_fields!(EventMessage);

/// A query: routed by `query_name` to handlers whose response type matches.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMessage {
    message: Message,
    query_name: String,
    response_type: ResponseType,
}

impl QueryMessage {
    /// A query expecting a single `R`. The query name doubles as the payload type.
    pub fn new<R: 'static>(query_name: impl Into<String>, payload: Value) -> Self {
        let query_name = query_name.into();
        Self::from_message(
            Message::new(query_name.as_str(), Some(payload)),
            query_name,
            ResponseType::instance_of::<R>(),
        )
    }

    pub fn from_message(
        message: Message,
        query_name: impl Into<String>,
        response_type: ResponseType,
    ) -> Self {
        Self {
            message,
            query_name: query_name.into(),
            response_type,
        }
    }

    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    pub fn response_type(&self) -> &ResponseType {
        &self.response_type
    }
}

delegate_message_fields!(QueryMessage);
