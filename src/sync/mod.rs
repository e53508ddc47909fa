//! Low-level concurrency primitives (L0) that the rest of the crate is
//! built on: a blocking/non-blocking FIFO queue, a reusable barrier, a
//! scoped counter with wait-for-zero, deadlock-free multi-mutex
//! acquisition, and a self-managed-lifetime mixin.

pub mod lock_many;
pub mod queue;
pub mod scoped_counter;
pub mod self_managing;
pub mod starter_pistol;

pub use lock_many::{LockMany, lock_many};
pub use queue::ConcurrentQueue;
pub use scoped_counter::{ScopedAdjustment, ScopedCounter};
pub use self_managing::{EnsureLocked, SelfManaging};
pub use starter_pistol::StarterPistol;
