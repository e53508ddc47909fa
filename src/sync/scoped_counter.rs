//! An integer with scoped +delta/-delta adjustments and wait-for-zero.
//!
//! The value lives in a cache-padded atomic (every pool worker touches the
//! "not idle" instance of this counter on every queue pop, so false sharing
//! with neighbouring fields would be expensive). The mutex/condvar pair is
//! used only to block/wake waiters — never to guard the value itself.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Condvar, Mutex};

pub struct ScopedCounter {
    value: CachePadded<AtomicI64>,
    wait_mutex: Mutex<()>,
    wake: Condvar,
}

impl Default for ScopedCounter {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ScopedCounter {
    pub fn new(initial: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(initial)),
            wait_mutex: Mutex::new(()),
            wake: Condvar::new(),
        }
    }

    /// Applies `delta` now; dropping the returned [`ScopedAdjustment`]
    /// reverses it.
    pub fn delta(&self, delta: i64) -> ScopedAdjustment<'_> {
        self.adjust(delta);
        ScopedAdjustment { counter: self, delta }
    }

    pub fn is_zero(&self) -> bool {
        self.value.load(Ordering::Acquire) == 0
    }

    /// Blocks until the value reaches zero.
    pub fn wait_for_zero(&self) {
        if self.is_zero() {
            return;
        }
        let guard = self.wait_mutex.lock().unwrap();
        let _guard = self
            .wake
            .wait_while(guard, |()| !self.is_zero())
            .unwrap();
    }

    /// Wakes every waiter without changing the value — used to nudge a
    /// blocked `wait_for_zero` when an out-of-band event (an exception)
    /// needs attention even though the count may still be nonzero.
    pub fn notify(&self) {
        let _guard = self.wait_mutex.lock().unwrap();
        self.wake.notify_all();
    }

    fn adjust(&self, delta: i64) {
        if delta == 0 {
            return;
        }
        self.value.fetch_add(delta, Ordering::AcqRel);
        let _guard = self.wait_mutex.lock().unwrap();
        self.wake.notify_all();
    }
}

/// RAII token produced by [`ScopedCounter::delta`]. Reverses the adjustment
/// on drop.
pub struct ScopedAdjustment<'a> {
    counter: &'a ScopedCounter,
    delta: i64,
}

impl Drop for ScopedAdjustment<'_> {
    fn drop(&mut self) {
        self.counter.adjust(-self.delta);
    }
}
