//! Typed multi-pool thread loop. Each pool owns its own FIFO queue and a
//! fixed set of worker threads that drain only from that queue — there is
//! no work stealing between pools.

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::{EventLoop, Job};
use crate::error::{Failure, PoolError, panic_payload_to_failure};
use crate::pool::Pool;
use crate::sync::{ConcurrentQueue, ScopedCounter, StarterPistol, lock_many};

thread_local! {
    static CURRENT_POOL: Cell<Pool> = const { Cell::new(Pool::Unknown) };
}

/// Returns the pool the calling thread is a worker of, or `Pool::Unknown`
/// if the caller is not a `ParallelEventLoop` worker thread at all.
pub fn current_pool() -> Pool {
    CURRENT_POOL.with(|c| c.get())
}

struct Inner {
    queues: HashMap<Pool, ConcurrentQueue<Job>>,
    not_idle: ScopedCounter,
    exceptions: Mutex<VecDeque<Failure>>,
    default_pool: Pool,
}

impl EventLoop for Inner {
    fn default_pool(&self) -> Pool {
        self.default_pool
    }

    fn push_to(&self, pool: Pool, job: Job) {
        let resolved = if pool == Pool::Same { current_pool() } else { pool };
        if !resolved.is_addressable() {
            panic!("{}", PoolError::SameOutsideWorker);
        }
        let queue = self
            .queues
            .get(&resolved)
            .unwrap_or_else(|| panic!("{}", PoolError::UnknownPool(resolved)));
        queue.push(job);
    }
}

/// A set of named thread pools, each with its own task queue. Dropping the
/// loop waits for all in-flight work to finish (via [`join`](Self::join)),
/// then tears down every worker thread.
pub struct ParallelEventLoop {
    inner: Arc<Inner>,
    threads: Vec<JoinHandle<()>>,
}

impl ParallelEventLoop {
    /// Constructs the loop with one queue and `count` worker threads per
    /// entry of `pools`. Does not return until every worker has reached its
    /// initial idle wait, via a shared starter pistol.
    pub fn new(pools: impl IntoIterator<Item = (Pool, usize)>) -> Result<Self, PoolError> {
        let pools: Vec<(Pool, usize)> = pools.into_iter().collect();
        let mut total_threads = 0usize;
        for &(pool, count) in &pools {
            if count == 0 {
                return Err(PoolError::NonPositiveThreadCount(pool));
            }
            total_threads += count;
        }

        let mut queues = HashMap::with_capacity(pools.len());
        for &(pool, _) in &pools {
            queues.insert(pool, ConcurrentQueue::new());
        }
        let default_pool = pools.first().map(|(pool, _)| *pool).unwrap_or(Pool::Reactor);
        let inner = Arc::new(Inner {
            queues,
            not_idle: ScopedCounter::new(0),
            exceptions: Mutex::new(VecDeque::new()),
            default_pool,
        });

        // Include this thread in the count of participants to start.
        let pistol = Arc::new(StarterPistol::new(total_threads + 1));
        let mut threads = Vec::with_capacity(total_threads);
        for (pool, count) in pools {
            for _ in 0..count {
                let inner = inner.clone();
                let pistol = pistol.clone();
                let handle = thread::Builder::new()
                    .name(format!("{pool:?}"))
                    .spawn(move || worker_loop(inner, pool, pistol))
                    .expect("failed to spawn pool worker thread");
                threads.push(handle);
            }
        }
        pistol.ready();
        tracing::debug!(total_threads, "parallel event loop started");

        Ok(Self { inner, threads })
    }

    /// Returns the pool the calling thread is a worker of, or
    /// `Pool::Unknown` if the caller is not a worker thread of this loop
    /// (or of any `ParallelEventLoop`).
    pub fn current_pool() -> Pool {
        current_pool()
    }

    /// Passes each captured exception through `handler` (if given) in turn,
    /// discarding them if `handler` is `None`.
    pub fn process_exceptions(&self, handler: Option<&mut dyn FnMut(Failure)>) {
        self.drain_exceptions(handler);
    }

    fn drain_exceptions(&self, mut handler: Option<&mut dyn FnMut(Failure)>) {
        loop {
            let next = self.inner.exceptions.lock().unwrap().pop_front();
            match next {
                Some(failure) => {
                    if let Some(handler) = handler.as_deref_mut() {
                        handler(failure);
                    }
                }
                None => break,
            }
        }
    }

    /// Blocks until every queue is empty and every worker is idle. Routes
    /// any exception captured before or during the wait to `handler`.
    ///
    /// Calling this from inside a worker thread is a programming error.
    pub fn join(&self, mut handler: Option<&mut dyn FnMut(Failure)>) {
        if current_pool() != Pool::Unknown {
            crate::error::ProgrammingError::JoinFromWorker.check();
        }
        loop {
            self.drain_exceptions(handler.as_deref_mut());
            self.inner.not_idle.wait_for_zero();
            let mutexes: Vec<_> = self.inner.queues.values().map(|q| q.mutex()).collect();
            let locked = lock_many(mutexes);
            let all_empty = locked.guards().iter().all(|q| q.is_empty());
            let quiescent = all_empty && self.inner.not_idle.is_zero();
            drop(locked);
            if quiescent {
                break;
            }
        }
        self.drain_exceptions(handler.as_deref_mut());
    }
}

impl EventLoop for ParallelEventLoop {
    fn default_pool(&self) -> Pool {
        self.inner.default_pool()
    }

    fn push_to(&self, pool: Pool, job: Job) {
        self.inner.push_to(pool, job);
    }
}

impl Drop for ParallelEventLoop {
    fn drop(&mut self) {
        self.join(None);
        for queue in self.inner.queues.values() {
            queue.set_nonblocking(true);
        }
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked outright, not via a captured job panic");
            }
        }
    }
}

fn worker_loop(inner: Arc<Inner>, pool: Pool, pistol: Arc<StarterPistol>) {
    CURRENT_POOL.with(|c| c.set(pool));
    tracing::trace!(?pool, "worker thread starting");
    // Mark this thread as working; undone temporarily by any blocking wait
    // in the queue's pop, via the wait guard below.
    let _busy = inner.not_idle.delta(1);
    pistol.ready();

    let queue = inner
        .queues
        .get(&pool)
        .expect("worker spawned for a pool with no queue");

    loop {
        let job = queue.pop_with_guard(|| inner.not_idle.delta(-1));
        match job {
            Some(job) => {
                let outcome =
                    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| job(inner.as_ref())));
                if let Err(payload) = outcome {
                    inner
                        .exceptions
                        .lock()
                        .unwrap()
                        .push_back(panic_payload_to_failure(payload));
                    // Nudge any ongoing join() that there is an exception to handle.
                    inner.not_idle.notify();
                }
            }
            None => break,
        }
    }
    tracing::trace!(?pool, "worker thread exiting");
}
