//! ResultMessage - ハンドラ実行結果の共通フォーマット
//!
//! 成功（payload）か失敗（exception）のどちらか一方だけが意味を持ちます。
//! `is_success() == exception.is_none()`。

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::{BusError, HandlerError};
use super::ids::MessageId;
use super::message::Message;
use super::metadata::MetaData;

/// Outcome of handling one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMessage<R> {
    id: MessageId,
    metadata: MetaData,
    payload: Option<R>,
    exception: Option<HandlerError>,
}

impl<R> ResultMessage<R> {
    pub fn success(payload: Option<R>) -> Self {
        Self {
            id: MessageId::generate(),
            metadata: MetaData::EMPTY,
            payload,
            exception: None,
        }
    }

    pub fn failure(exception: HandlerError) -> Self {
        Self {
            id: MessageId::generate(),
            metadata: MetaData::EMPTY,
            payload: None,
            exception: Some(exception),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    pub fn is_success(&self) -> bool {
        self.exception.is_none()
    }

    pub fn payload(&self) -> Option<&R> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<R> {
        self.payload
    }

    pub fn exception(&self) -> Option<&HandlerError> {
        self.exception.as_ref()
    }

    /// Splits into the caller-facing `Result`; a failed handler becomes
    /// `BusError::HandlerExecutionFailed`.
    pub fn into_result(self) -> Result<Option<R>, BusError> {
        match self.exception {
            Some(exception) => Err(BusError::HandlerExecutionFailed(exception)),
            None => Ok(self.payload),
        }
    }

    pub fn with_metadata(self, metadata: MetaData) -> Self {
        Self { metadata, ..self }
    }

    pub fn and_metadata(self, metadata: &MetaData) -> Self {
        Self {
            metadata: self.metadata.merged_with(metadata),
            ..self
        }
    }

    /// Converts the payload, keeping identifier and metadata. A conversion error turns a
    /// successful result into a failed one; failures pass through untouched.
    pub fn try_map<U, F>(self, convert: F) -> ResultMessage<U>
    where
        F: FnOnce(R) -> Result<Option<U>, HandlerError>,
    {
        let (payload, exception) = match (self.exception, self.payload) {
            (Some(exception), _) => (None, Some(exception)),
            (None, None) => (None, None),
            (None, Some(payload)) => match convert(payload) {
                Ok(converted) => (converted, None),
                Err(exception) => (None, Some(exception)),
            },
        };
        ResultMessage {
            id: self.id,
            metadata: self.metadata,
            payload,
            exception,
        }
    }
}

impl ResultMessage<Value> {
    /// Coerces whatever a handler produced into a result.
    ///
    /// - an existing result is kept as is
    /// - a message lends its identifier, payload and metadata
    /// - a bare value becomes a fresh successful result
    pub fn from_reply(reply: Reply) -> Self {
        match reply {
            Reply::Result(result) => result,
            Reply::Message(message) => Self {
                id: message.id(),
                metadata: message.metadata().clone(),
                payload: message.into_payload(),
                exception: None,
            },
            Reply::Value(value) => Self::success(value),
        }
    }

    /// Decodes the JSON payload into `R` (`null` becomes `None`).
    pub fn decode<R: DeserializeOwned>(self) -> ResultMessage<R> {
        self.try_map(|value| match value {
            Value::Null => Ok(None),
            value => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| HandlerError::conversion(format!("result decode: {e}"))),
        })
    }
}

/// What a handler hands back to the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Value(Option<Value>),
    Message(Message),
    Result(ResultMessage<Value>),
}

impl Reply {
    /// No result payload.
    pub fn empty() -> Self {
        Self::Value(None)
    }

    pub fn json<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        serde_json::to_value(value)
            .map(|value| Self::Value(Some(value)))
            .map_err(|e| HandlerError::conversion(format!("reply encode: {e}")))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Value(Some(value))
    }
}

impl From<Option<Value>> for Reply {
    fn from(value: Option<Value>) -> Self {
        Self::Value(value)
    }
}

impl From<Message> for Reply {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

impl From<ResultMessage<Value>> for Reply {
    fn from(result: ResultMessage<Value>) -> Self {
        Self::Result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_and_failure_are_exclusive() {
        let ok = ResultMessage::success(Some(1));
        assert!(ok.is_success());
        assert!(ok.exception().is_none());

        let failed = ResultMessage::<u32>::failure(HandlerError::new("fail"));
        assert!(!failed.is_success());
        assert!(failed.payload().is_none());
        assert_eq!(failed.exception(), Some(&HandlerError::new("fail")));
    }

    #[test]
    fn reply_from_result_is_kept() {
        let inner = ResultMessage::<Value>::failure(HandlerError::new("nope"))
            .with_metadata(MetaData::with("k", "v"));
        let coerced = ResultMessage::from_reply(Reply::from(inner.clone()));
        assert_eq!(coerced, inner);
    }

    #[test]
    fn reply_from_message_keeps_id_and_metadata() {
        let message = Message::new("Pong", Some(json!("pong"))).with_metadata(MetaData::with("k", 1));
        let coerced = ResultMessage::from_reply(Reply::from(message.clone()));
        assert!(coerced.is_success());
        assert_eq!(coerced.id(), message.id());
        assert_eq!(coerced.metadata(), message.metadata());
        assert_eq!(coerced.payload(), Some(&json!("pong")));
    }

    #[test]
    fn decode_failure_becomes_failed_result() {
        let result = ResultMessage::success(Some(json!("text"))).decode::<u32>();
        assert!(!result.is_success());
    }

    #[test]
    fn decode_null_is_empty_success() {
        let result = ResultMessage::success(Some(Value::Null)).decode::<String>();
        assert!(result.is_success());
        assert!(result.payload().is_none());
    }

    #[test]
    fn into_result_raises_handler_failure() {
        let err = ResultMessage::<u32>::failure(HandlerError::new("boom"))
            .into_result()
            .unwrap_err();
        assert!(matches!(err, BusError::HandlerExecutionFailed(e) if e.message() == "boom"));
    }
}
