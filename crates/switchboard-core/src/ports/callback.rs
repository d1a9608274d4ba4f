//! CommandCallback port - コマンド処理結果の受け取り口

use serde_json::Value;

use crate::domain::{CommandMessage, ResultMessage};

/// Receives the outcome of a command once its handler has finished.
pub trait CommandCallback: Send + Sync {
    fn on_result(&self, command: &CommandMessage, result: &ResultMessage<Value>);
}

impl<F> CommandCallback for F
where
    F: Fn(&CommandMessage, &ResultMessage<Value>) + Send + Sync,
{
    fn on_result(&self, command: &CommandMessage, result: &ResultMessage<Value>) {
        self(command, result)
    }
}
