//! Closed enumeration of worker pool identifiers.
//!
//! The set of pools is fixed at compile time and is deliberately not
//! user-extensible — adding a pool role is a change to this crate, not a
//! runtime configuration. `Same` and `Unknown` are sentinels rather than
//! real pools: `Same` is resolved to the caller's current pool before a job
//! is ever queued, and `Unknown` can never back a queue (it identifies
//! threads that are not pool workers at all, e.g. the application's main
//! thread).

/// A named category of worker threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pool {
    /// Use the pushing thread's own current pool. Only valid to pass to
    /// `push`/`task`; never a queue's key.
    Same,
    /// Not a worker thread of any `ParallelEventLoop` (e.g. the main
    /// thread). Never a queue's key.
    Unknown,
    Reactor,
    Interaction,
    Controller,
    Calculation,
    IoLocal,
    IoRemote,
}

impl Pool {
    /// The pools that can actually back a queue (excludes the `Same` and
    /// `Unknown` sentinels).
    pub const ADDRESSABLE: &'static [Pool] = &[
        Pool::Reactor,
        Pool::Interaction,
        Pool::Controller,
        Pool::Calculation,
        Pool::IoLocal,
        Pool::IoRemote,
    ];

    pub fn is_addressable(self) -> bool {
        !matches!(self, Pool::Same | Pool::Unknown)
    }
}
