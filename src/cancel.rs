use crate::spin::SpinLock;
use crossbeam::sync::Unparker;
use std::sync::atomic::{AtomicBool, Ordering::*};
use std::sync::Arc;

/// Handle for cancelling a pending queued acquisition from another execution
/// context.
///
/// A token tracks one pending wait at a time: attaching a new wait replaces
/// the previous one. `cancel` is idempotent; cancelling with no wait attached
/// simply leaves the flag set, so a later cancellable acquisition fails
/// before queueing.
#[derive(Clone)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

struct Shared {
    cancelled: AtomicBool,
    waiter: SpinLock<Option<Unparker>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                cancelled: AtomicBool::new(false),
                waiter: SpinLock::new(None),
            }),
        }
    }

    /// Cancels the attached wait. The flag is published before the unpark so
    /// the woken thread observes it.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Release);
        let unparker = self.shared.waiter.lock().clone();
        if let Some(unparker) = unparker {
            unparker.unpark();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Acquire)
    }

    pub(crate) fn attach(&self, unparker: Unparker) {
        *self.shared.waiter.lock() = Some(unparker);
    }

    pub(crate) fn detach(&self) {
        self.shared.waiter.lock().take();
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_sticky_and_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
    }
}
