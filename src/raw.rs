use crate::cancel::CancelToken;
use crate::error::LockError;
use crate::spin::SpinLock;
use crate::waiter::{WaitQueue, Waiter};
use crossbeam::sync::Parker;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering::*};
use std::sync::Arc;
use std::thread::{self, ThreadId};

const UNLOCKED: usize = 0;
const LOCKED: usize = 1;

/// Outcome of one round of queued waiting.
enum Wait {
    /// The lock was taken directly while enqueueing; no grant was consumed.
    Acquired,
    /// The node was granted; the caller retries the fast path.
    Granted,
}

/// A non-reentrant mutual-exclusion lock with an explicit `unlock`.
///
/// Acquisition races a compare-and-swap on a single-word state cell; losers
/// queue a waiter node and park until a releasing thread grants them. Wake
/// order is FIFO by arrival, but a fresh caller can still barge past a woken
/// waiter, so grant order is not strictly FIFO.
///
/// The lock does not track re-entry: a thread that calls `lock` while
/// already holding it parks forever waiting for itself. `unlock` does not
/// verify caller identity either; the only protocol check is that the lock
/// is currently held.
pub struct RawMutex {
    state: AtomicUsize,
    owner: SpinLock<Option<ThreadId>>,
    queue: WaitQueue,
}

impl RawMutex {
    pub fn new() -> Self {
        Self {
            state: AtomicUsize::new(UNLOCKED),
            owner: SpinLock::new(None),
            queue: WaitQueue::new(),
        }
    }

    /// Acquires the lock, parking the calling thread while it is held
    /// elsewhere.
    pub fn lock(&self) {
        if self.try_lock() {
            return;
        }
        // no cancellation source, so the slow path cannot fail
        let result = self.lock_slow(None);
        debug_assert!(result.is_ok());
    }

    /// Acquires the lock unless `cancel` fires first.
    ///
    /// On cancellation the waiter node is excised from the queue, the lock is
    /// left untouched and `LockError::Interrupted` is returned. A token that
    /// is already cancelled fails the call before anything is queued.
    pub fn lock_cancellable(&self, cancel: &CancelToken) -> Result<(), LockError> {
        if cancel.is_cancelled() {
            return Err(LockError::Interrupted);
        }
        if self.try_lock() {
            return Ok(());
        }
        self.lock_slow(Some(cancel))
    }

    /// The bare fast path: a single compare-and-swap, never blocks.
    pub fn try_lock(&self) -> bool {
        if self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Acquire, Relaxed)
            .is_ok()
        {
            *self.owner.lock() = Some(thread::current().id());
            true
        } else {
            false
        }
    }

    /// Releases the lock and wakes the oldest still-waiting acquirer, if any.
    ///
    /// Fails with `LockError::NotLocked` when the lock is not currently held.
    /// Never blocks.
    pub fn unlock(&self) -> Result<(), LockError> {
        if self.state.load(Acquire) == UNLOCKED {
            return Err(LockError::NotLocked);
        }
        self.owner.lock().take();
        if self
            .state
            .compare_exchange(LOCKED, UNLOCKED, Release, Relaxed)
            .is_err()
        {
            // lost a race with another unlock
            return Err(LockError::NotLocked);
        }
        self.wake_next();
        Ok(())
    }

    /// Whether the lock is currently held, by anyone. Side-effect free.
    pub fn is_locked(&self) -> bool {
        self.state.load(Acquire) == LOCKED
    }

    /// Number of currently queued waiters.
    pub fn waiters(&self) -> usize {
        self.queue.len()
    }

    fn lock_slow(&self, cancel: Option<&CancelToken>) -> Result<(), LockError> {
        loop {
            if self.try_lock() {
                return Ok(());
            }
            match self.wait_for_grant(cancel)? {
                Wait::Acquired => return Ok(()),
                Wait::Granted => {}
            }
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    // the grant was consumed; pass the wake on so the queue
                    // behind us does not stall
                    self.wake_next();
                    return Err(LockError::Interrupted);
                }
            }
        }
    }

    /// Enqueues a waiter node for the calling thread and parks until it is
    /// granted or cancelled.
    fn wait_for_grant(&self, cancel: Option<&CancelToken>) -> Result<Wait, LockError> {
        let parker = Parker::new();
        let waiter = Arc::new(Waiter::new(
            parker.unparker().clone(),
            thread::current().id(),
        ));
        self.queue.enqueue(Arc::clone(&waiter));

        // The holder may have released between the failed fast path and the
        // enqueue, in which case its wake scan saw an empty queue. Recheck so
        // that a free lock is never left with a sleeping waiter.
        if self.try_lock() {
            self.queue.remove(&waiter);
            return Ok(Wait::Acquired);
        }

        if let Some(token) = cancel {
            token.attach(parker.unparker().clone());
        }
        tracing::trace!(waiters = self.queue.len(), "parked behind holder");

        loop {
            if waiter.granted() {
                if let Some(token) = cancel {
                    token.detach();
                }
                return Ok(Wait::Granted);
            }
            if waiter.cancelled() {
                self.queue.remove(&waiter);
                if let Some(token) = cancel {
                    token.detach();
                }
                tracing::trace!("queued wait cancelled");
                return Err(LockError::Interrupted);
            }
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    // arbitrate against a concurrent grant; the next pass of
                    // the loop observes whichever transition won
                    waiter.try_cancel();
                    continue;
                }
            }
            parker.park();
        }
    }

    fn wake_next(&self) {
        if let Some(waiter) = self.queue.dequeue_granted() {
            tracing::trace!(thread = ?waiter.thread(), "granting queued waiter");
            waiter.unpark();
        }
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RawMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMutex")
            .field("locked", &self.is_locked())
            .field("owner", &*self.owner.lock())
            .field("waiters", &self.waiters())
            .finish()
    }
}
