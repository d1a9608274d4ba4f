//! Registration - 購読の解除ハンドル
//!
//! `cancel()` は何度呼んでも安全で、実際に解除したのは最初の一回だけです。
//! Drop しても解除はされません（明示的に `cancel()` を呼ぶ）。

use parking_lot::Mutex;
use std::fmt;

use crate::domain::SubscriptionId;

type CancelAction = Box<dyn FnOnce() -> bool + Send>;

/// Handle returned by every `subscribe`.
pub struct Registration {
    id: SubscriptionId,
    action: Mutex<Option<CancelAction>>,
}

impl Registration {
    pub(crate) fn new(id: SubscriptionId, action: impl FnOnce() -> bool + Send + 'static) -> Self {
        Self {
            id,
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes the subscription. `true` only for the call that actually removed something;
    /// later calls return `false`.
    pub fn cancel(&self) -> bool {
        let action = self.action.lock().take();
        action.is_some_and(|cancel| cancel())
    }

    pub fn is_cancelled(&self) -> bool {
        self.action.lock().is_none()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cancel_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registration = Registration::new(SubscriptionId::generate(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        assert!(registration.cancel());
        assert!(!registration.cancel());
        assert!(registration.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_does_not_cancel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        drop(Registration::new(SubscriptionId::generate(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn concurrent_cancels_remove_once() {
        let registration = Registration::new(SubscriptionId::generate(), || true);
        let removed = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    if registration.cancel() {
                        removed.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }
}
