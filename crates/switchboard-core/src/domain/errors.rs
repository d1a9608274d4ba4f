//! Errors - エラー型と分類
//!
//! - `BusError`: 呼び出し側に raise されるエラー（ハンドラ未登録・重複拒否など）
//! - `HandlerError`: ハンドラ本体の失敗。dispatch/query では raise されず、
//!   `ResultMessage` の exception として運ばれる

use std::fmt;
use std::sync::Arc;

use super::response_type::ResponseType;

/// ErrorKind は HandlerError の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The handler body itself failed.
    Execution,
    /// The message payload could not be decoded into the handler's type.
    Decode,
    /// The handler's raw output could not be converted into the expected response.
    Conversion,
}

/// Opaque failure raised by a handler body.
///
/// Cloneable so the same failure can sit inside a `ResultMessage` and be handed to callbacks.
#[derive(Clone)]
pub struct HandlerError {
    kind: ErrorKind,
    message: String,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Execution,
            message: message.into(),
            source: None,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Decode,
            ..Self::new(message)
        }
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Conversion,
            ..Self::new(message)
        }
    }

    /// Wraps an arbitrary error, keeping it as the source.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind: ErrorKind::Execution,
            message: error.to_string(),
            source: Some(Arc::new(error)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

// source は比較しない（kind + message のみ）
impl PartialEq for HandlerError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl Eq for HandlerError {}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        Self {
            kind: ErrorKind::Decode,
            ..Self::from_error(error)
        }
    }
}

/// Returned by a duplicate-resolution policy that refuses a new command handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct DuplicateRejected {
    pub reason: String,
}

impl DuplicateRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// BusError は呼び出し側に伝播するエラー
#[derive(Debug, Clone, thiserror::Error)]
pub enum BusError {
    #[error("no handler was subscribed to command '{command_name}'")]
    NoHandlerForCommand { command_name: String },

    #[error("no handler found for query '{query_name}' with response type {response_type}")]
    NoHandlerForQuery {
        query_name: String,
        response_type: ResponseType,
    },

    #[error("duplicate handler for command '{command_name}' rejected: {reason}")]
    DuplicateSubscriptionRejected {
        command_name: String,
        reason: String,
    },

    #[error("handler execution failed: {0}")]
    HandlerExecutionFailed(#[source] HandlerError),

    #[error("{} event processor(s) failed", .0.len())]
    EventProcessingFailed(Vec<HandlerError>),
}

impl BusError {
    pub fn no_handler_for_command(command_name: impl Into<String>) -> Self {
        Self::NoHandlerForCommand {
            command_name: command_name.into(),
        }
    }

    pub fn rejected(command_name: impl Into<String>, rejection: DuplicateRejected) -> Self {
        Self::DuplicateSubscriptionRejected {
            command_name: command_name.into(),
            reason: rejection.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire")]
    struct Boom;

    #[test]
    fn handler_error_keeps_source() {
        let err = HandlerError::from_error(Boom);
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(err.to_string(), "disk on fire");
        assert!(err.source().is_some());
    }

    #[test]
    fn equality_ignores_source() {
        assert_eq!(HandlerError::from_error(Boom), HandlerError::new("disk on fire"));
        assert_ne!(HandlerError::new("x"), HandlerError::decode("x"));
    }

    #[test]
    fn json_errors_are_decode_errors() {
        let json_err = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let err: HandlerError = json_err.into();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn bus_error_messages_name_the_key() {
        let err = BusError::no_handler_for_command("Ping");
        assert!(err.to_string().contains("Ping"));

        let err = BusError::rejected("Ping", DuplicateRejected::new("already taken"));
        assert!(matches!(
            &err,
            BusError::DuplicateSubscriptionRejected { command_name, reason }
                if command_name == "Ping" && reason == "already taken"
        ));
    }
}
