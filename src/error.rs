/// Errors reported by the lock protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// `unlock` was called while the mutex was not locked.
    #[error("mutex is not locked")]
    NotLocked,

    /// A queued wait was cancelled before the lock was granted.
    #[error("wait was cancelled before the lock was granted")]
    Interrupted,
}
