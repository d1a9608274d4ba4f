//! 組み込みの CommandCallback

use serde_json::Value;
use tracing::{info, warn};

use crate::domain::{CommandMessage, ResultMessage};
use crate::ports::CommandCallback;

/// Ignores every result. Default callback of `CommandBus::send`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl CommandCallback for NoOpCallback {
    fn on_result(&self, _command: &CommandMessage, _result: &ResultMessage<Value>) {}
}

/// Logs each outcome: `info` on success, `warn` on failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCallback;

impl CommandCallback for LoggingCallback {
    fn on_result(&self, command: &CommandMessage, result: &ResultMessage<Value>) {
        match result.exception() {
            None => info!(
                command_name = command.command_name(),
                message_id = %command.id(),
                "command handled"
            ),
            Some(error) => warn!(
                command_name = command.command_name(),
                message_id = %command.id(),
                error = %error,
                "command failed"
            ),
        }
    }
}
