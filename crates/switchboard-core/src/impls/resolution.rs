//! 二重購読の解決ポリシー（組み込み）
//!
//! | ポリシー | 残るハンドラ | 副作用 |
//! |---|---|---|
//! | `SilentOverride` | 新しい方 | なし |
//! | `LogAndOverride` | 新しい方 | warn ログ |
//! | `RejectDuplicates` | 既存の方 | 購読がエラーになる |

use tracing::warn;

use crate::domain::DuplicateRejected;
use crate::ports::{DuplicateResolver, SharedCommandHandler};

/// The newest subscription wins without comment. Default for `CommandBus`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentOverride;

impl DuplicateResolver for SilentOverride {
    fn resolve(
        &self,
        _command_name: &str,
        _registered: &SharedCommandHandler,
        candidate: &SharedCommandHandler,
    ) -> Result<SharedCommandHandler, DuplicateRejected> {
        Ok(candidate.clone())
    }
}

/// The newest subscription wins; the replacement is logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAndOverride;

impl DuplicateResolver for LogAndOverride {
    fn resolve(
        &self,
        command_name: &str,
        _registered: &SharedCommandHandler,
        candidate: &SharedCommandHandler,
    ) -> Result<SharedCommandHandler, DuplicateRejected> {
        warn!(
            command_name,
            "duplicate command handler subscription; the newest handler replaces the previous one"
        );
        Ok(candidate.clone())
    }
}

/// A second handler for a name is refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectDuplicates;

impl DuplicateResolver for RejectDuplicates {
    fn resolve(
        &self,
        command_name: &str,
        _registered: &SharedCommandHandler,
        _candidate: &SharedCommandHandler,
    ) -> Result<SharedCommandHandler, DuplicateRejected> {
        Err(DuplicateRejected::new(format!(
            "a handler is already subscribed to '{command_name}'"
        )))
    }
}

pub fn silent_override() -> SilentOverride {
    SilentOverride
}

pub fn log_and_override() -> LogAndOverride {
    LogAndOverride
}

pub fn reject_duplicates() -> RejectDuplicates {
    RejectDuplicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Reply;
    use crate::impls::command_handler_fn;
    use crate::ports::same_handler;

    fn handler() -> SharedCommandHandler {
        command_handler_fn(|_| async { Ok(Reply::empty()) })
    }

    #[test]
    fn override_policies_pick_candidate() {
        let (old, new) = (handler(), handler());
        let silent = silent_override().resolve("Ping", &old, &new).unwrap();
        let logged = log_and_override().resolve("Ping", &old, &new).unwrap();
        assert!(same_handler(&silent, &new));
        assert!(same_handler(&logged, &new));
    }

    #[test]
    fn reject_names_the_command() {
        let err = reject_duplicates()
            .resolve("Ping", &handler(), &handler())
            .err()
            .unwrap();
        assert!(err.to_string().contains("Ping"));
    }
}
