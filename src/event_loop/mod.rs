//! Abstract dispatcher contract, with synchronous (single-thread drain) and
//! parallel (typed multi-pool) implementations.

pub mod parallel;
pub mod synchronous;

pub use parallel::{ParallelEventLoop, current_pool};
pub use synchronous::SynchronousEventLoop;

use crate::pool::Pool;

/// A unit of work submitted to an [`EventLoop`]. Takes a loop reference so it
/// can itself push follow-up jobs (e.g. a task's reaction step).
pub type Job = Box<dyn FnOnce(&dyn EventLoop) + Send>;

/// Contract shared by every event loop flavour: push work tagged with a
/// pool, or push to the loop's default pool.
pub trait EventLoop {
    /// Enqueues `job` on `pool`. `Pool::Same`/`Pool::Unknown` handling is up
    /// to the implementation (the synchronous loop ignores the pool
    /// argument entirely; the parallel loop resolves `Same` to the caller's
    /// current pool and rejects `Unknown`).
    fn push_to(&self, pool: Pool, job: Job);

    /// The pool used by [`push`](Self::push).
    fn default_pool(&self) -> Pool;

    /// Enqueues `job` on this loop's default pool.
    fn push(&self, job: Job) {
        self.push_to(self.default_pool(), job);
    }
}
