//! A queued, parking mutual-exclusion lock built from first principles.
//!
//! The lock couples a single-word atomic state cell with a FIFO wait queue of
//! parked threads. Acquisition first races a compare-and-swap on the state
//! cell; on failure the caller enqueues a waiter node and parks until a
//! releasing thread grants it. Wakeups are FIFO by arrival order, but a fresh
//! caller may still barge past a woken waiter, so grant order is not strictly
//! FIFO. The lock is deliberately non-reentrant: a holder that locks again
//! deadlocks on itself.
//!
//! [`RawMutex`] exposes the bare `lock`/`unlock`/`is_locked` protocol with
//! explicit error results; [`Mutex`] wraps it around a value with an RAII
//! guard. A pending queued acquisition can be abandoned from outside through
//! a [`CancelToken`].

mod cancel;
mod error;
mod mutex;
mod raw;
mod spin;
mod waiter;

pub use crate::cancel::CancelToken;
pub use crate::error::LockError;
pub use crate::mutex::{Mutex, MutexGuard};
pub use crate::raw::RawMutex;
