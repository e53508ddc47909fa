//! FIFO queue with blocking and non-blocking modes.
//!
//! `pop` waits for an item when the queue is in blocking mode (the default).
//! Flipping to non-blocking mode wakes every waiter so they can observe the
//! mode change and give up immediately instead of waiting forever.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

/// A FIFO queue shared between a single pushing side (many threads may push)
/// and a single popping side (per-pool worker threads).
///
/// The queue's own mutex is held for the full duration of a `pop` call,
/// including across instantiation and destruction of the wait guard, so idle
/// accounting (see [`pop`](ConcurrentQueue::pop)) always matches queue
/// membership.
pub struct ConcurrentQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    nonblocking: AtomicBool,
}

impl<T> Default for ConcurrentQueue<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            nonblocking: AtomicBool::new(false),
        }
    }
}

impl<T> ConcurrentQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item to the back of the queue, waking one waiter.
    pub fn push(&self, item: T) {
        let mut items = self.items.lock().unwrap();
        items.push_back(item);
        drop(items);
        self.not_empty.notify_one();
    }

    /// Removes an item from the front of the queue.
    ///
    /// Blocks when the queue is empty and in blocking mode. Returns `None`
    /// immediately when the queue is empty and in non-blocking mode.
    pub fn pop(&self) -> Option<T> {
        self.pop_with_guard(|| ())
    }

    /// Like [`pop`](Self::pop), but `make_guard` is invoked (under the
    /// queue's mutex) only if this call is actually going to block, and the
    /// returned guard value is dropped (also under the mutex) as soon as the
    /// wait ends, whether by a push or by a mode flip to non-blocking.
    ///
    /// This is how a pool's worker marks itself idle only for the duration
    /// it is genuinely waiting, without perturbing the fast, non-waiting
    /// path.
    pub fn pop_with_guard<G>(&self, make_guard: impl FnOnce() -> G) -> Option<T> {
        let mut items = self.items.lock().unwrap();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            if self.nonblocking.load(Ordering::Acquire) {
                return None;
            }
            // About to actually wait: mark idle for the duration of the wait.
            let guard = make_guard();
            items = self.not_empty.wait(items).unwrap();
            drop(guard);
        }
    }

    /// Switches between blocking and non-blocking mode. Wakes every current
    /// waiter so they can observe the new mode.
    pub fn set_nonblocking(&self, nonblocking: bool) {
        // Hold the mutex while flipping so no pop() observes a torn state:
        // either it saw blocking mode and will be woken by notify_all, or it
        // sees non-blocking mode already and never waits.
        let _items = self.items.lock().unwrap();
        self.nonblocking.store(nonblocking, Ordering::Release);
        self.not_empty.notify_all();
    }

    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking.load(Ordering::Acquire)
    }

    /// Returns `true` if the queue currently holds no items.
    ///
    /// Takes the mutex directly so callers combining this check across
    /// several queues (see `event_loop::parallel::ParallelEventLoop::join`)
    /// can lock them all first via `lock_many` and call this while holding
    /// every lock.
    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    /// Exposes the queue's mutex for use with [`super::lock_many`].
    pub fn mutex(&self) -> &Mutex<VecDeque<T>> {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pop_blocks_until_pushed() {
        let queue = Arc::new(ConcurrentQueue::new());
        let q2 = queue.clone();
        let handle = thread::spawn(move || q2.pop());
        thread::sleep(Duration::from_millis(20));
        queue.push(42);
        assert_eq!(handle.join().unwrap(), Some(42));
    }

    #[test]
    fn nonblocking_pop_returns_none_when_empty() {
        let queue: ConcurrentQueue<i32> = ConcurrentQueue::new();
        queue.set_nonblocking(true);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn switching_to_nonblocking_wakes_waiters() {
        let queue = Arc::new(ConcurrentQueue::<i32>::new());
        let q2 = queue.clone();
        let handle = thread::spawn(move || q2.pop());
        thread::sleep(Duration::from_millis(20));
        queue.set_nonblocking(true);
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn fifo_order_preserved() {
        let queue = ConcurrentQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
    }

    #[test]
    fn guard_only_instantiated_when_actually_waiting() {
        let queue = ConcurrentQueue::new();
        queue.push(1);
        let mut instantiated = false;
        queue.pop_with_guard(|| instantiated = true);
        assert!(!instantiated, "guard must not run on the non-waiting path");
    }

    #[test]
    fn guard_instantiated_and_dropped_around_a_real_wait() {
        let queue = Arc::new(ConcurrentQueue::<i32>::new());
        let started = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ended = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let (q2, s2, e2) = (queue.clone(), started.clone(), ended.clone());
        let handle = thread::spawn(move || {
            q2.pop_with_guard(|| {
                s2.store(true, Ordering::Release);
                scopeguard(e2)
            })
        });
        thread::sleep(Duration::from_millis(20));
        assert!(started.load(Ordering::Acquire));
        assert!(!ended.load(Ordering::Acquire));
        queue.push(7);
        assert_eq!(handle.join().unwrap(), Some(7));
        assert!(ended.load(Ordering::Acquire));
    }

    struct DropFlag(Arc<std::sync::atomic::AtomicBool>);
    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::Release);
        }
    }
    fn scopeguard(flag: Arc<std::sync::atomic::AtomicBool>) -> DropFlag {
        DropFlag(flag)
    }
}
