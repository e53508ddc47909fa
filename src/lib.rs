//! A typed multi-pool promise/stream concurrency core.
//!
//! Three layers, bottom to top:
//!
//! - [`sync`]: L0 primitives (a blocking/non-blocking queue, a reusable
//!   barrier, a scoped wait-for-zero counter, deadlock-free multi-mutex
//!   locking, a self-managed-lifetime mixin) that nothing above this module
//!   depends on anything else in the crate for.
//! - [`event_loop`]: a closed set of named thread pools (see [`pool::Pool`]),
//!   each with its own FIFO job queue and no work stealing between them, plus
//!   a single-threaded synchronous variant for tests.
//! - [`promise`] and [`stream`]: single-assignment values and lazy,
//!   backpressured data streams built on top of the event loop, plus
//!   [`task`], which wraps a plain promise/stream factory so invoking it
//!   dispatches onto specific pools instead of the calling thread.
//!
//! None of this is an async runtime in the `Future`/`async fn` sense — there
//! is no polling, no waker, no executor reactor. A [`promise::Promise`]
//! settles exactly once, a callback bound to it runs exactly once, and every
//! callback this crate runs on a caller's behalf is wrapped in
//! [`std::panic::catch_unwind`] so a panicking callback rejects a promise
//! instead of unwinding across a worker thread or poisoning a lock.
//!
//! Bugs in how the API itself is used (double-resolve, rebinding a callback,
//! dropping a bound-but-incomplete promise) are reported via
//! [`error::ProgrammingError`], which panics in debug builds only and is a
//! no-op in release — see that type for why. Everything else a callback can
//! fail with travels as an opaque [`error::Failure`].

pub mod error;
pub mod event_loop;
pub mod pool;
pub mod promise;
pub mod stream;
pub mod sync;
pub mod task;

pub use error::{Failure, ProgrammingError};
pub use event_loop::{EventLoop, ParallelEventLoop, SynchronousEventLoop};
pub use pool::Pool;
pub use promise::{Continuation, Promise};
pub use stream::{Action, Stream};
pub use task::{SharedEventLoop, StreamTask, task, task_stream};
