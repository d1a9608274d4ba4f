//! DuplicateResolver port - 同じコマンド名への二重購読の解決
//!
//! 既存のハンドラと新しいハンドラのどちらを残すかを決めます。
//! 組み込みのポリシーは `impls::resolution` にあります。

use super::handler::SharedCommandHandler;
use crate::domain::DuplicateRejected;

/// Decides which handler stays subscribed when two collide on one command name.
///
/// Runs under the registry's stripe lock for that name, so it must not subscribe to or
/// cancel on the same bus.
pub trait DuplicateResolver: Send + Sync {
    fn resolve(
        &self,
        command_name: &str,
        registered: &SharedCommandHandler,
        candidate: &SharedCommandHandler,
    ) -> Result<SharedCommandHandler, DuplicateRejected>;
}

impl<F> DuplicateResolver for F
where
    F: Fn(&str, &SharedCommandHandler, &SharedCommandHandler) -> Result<SharedCommandHandler, DuplicateRejected>
        + Send
        + Sync,
{
    fn resolve(
        &self,
        command_name: &str,
        registered: &SharedCommandHandler,
        candidate: &SharedCommandHandler,
    ) -> Result<SharedCommandHandler, DuplicateRejected> {
        self(command_name, registered, candidate)
    }
}
