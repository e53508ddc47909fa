//! Error types.
//!
//! Domain failures reported by user callbacks are carried as [`Failure`], an
//! opaque, thread-safe, type-erased error — the Rust analogue of
//! `std::exception_ptr`. Logic bugs (double-bind, double-resolve, calling
//! `join` from a worker, dropping a bound-but-incomplete promise/stream) are
//! represented by [`ProgrammingError`] and are raised via `panic!` in debug
//! builds only
//! (see [`check`]); in release builds the checks are skipped entirely,
//! mirroring the original's `SAFE_PROMISES`/`SAFE_PROMISE_STREAMS` compile
//! guard. [`PoolError`] covers pool configuration mistakes, which are always
//! checked since they are caller mistakes discoverable at construction or
//! push time, not internal logic bugs.

use std::fmt;

/// An opaque, thread-safe domain failure, carried along a promise or stream
/// chain until observed by a `handler`/`except` or routed to `join`.
pub type Failure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Wraps a plain string as a [`Failure`], mirroring `reject(const string&)`.
pub fn failure_from(message: impl Into<String>) -> Failure {
    #[derive(Debug)]
    struct StringFailure(String);
    impl fmt::Display for StringFailure {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }
    impl std::error::Error for StringFailure {}
    Box::new(StringFailure(message.into()))
}

/// A bug in how this crate's API was used, not a recoverable condition.
#[derive(Debug, thiserror::Error)]
pub enum ProgrammingError {
    #[error("callbacks were already bound to this promise/stream")]
    CallbacksAlreadyBound,
    #[error("attempted to resolve/reject a promise that was already settled")]
    AlreadySettled,
    #[error("a bound but not-yet-completed promise/stream was dropped")]
    DroppedWhileBound,
    #[error("join() called from inside a worker thread")]
    JoinFromWorker,
}

impl ProgrammingError {
    /// Raises this error as a panic when debug assertions are enabled;
    /// no-op in release builds, matching the original's compiled-out safe
    /// mode checks.
    #[track_caller]
    pub fn check(self) {
        if cfg!(debug_assertions) {
            panic!("{self}");
        }
    }
}

/// Converts a captured `catch_unwind` payload into a [`Failure`]. Used
/// everywhere a user callback (job, promise continuation, stream consumer)
/// is run behind `catch_unwind` so a panic becomes an observable rejection
/// instead of unwinding across a pool worker or a promise chain.
pub(crate) fn panic_payload_to_failure(payload: Box<dyn std::any::Any + Send>) -> Failure {
    if let Some(message) = payload.downcast_ref::<&str>() {
        failure_from(*message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        failure_from(message.clone())
    } else {
        failure_from("callback panicked with a non-string payload")
    }
}

/// A mistake in how a [`crate::event_loop::parallel::ParallelEventLoop`] was
/// configured or used, always checked regardless of build profile.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("thread count for pool {0:?} must be positive; use SynchronousEventLoop instead")]
    NonPositiveThreadCount(crate::pool::Pool),
    #[error("pool {0:?} has no registered queue")]
    UnknownPool(crate::pool::Pool),
    #[error("Pool::Same used outside of a worker thread")]
    SameOutsideWorker,
}
