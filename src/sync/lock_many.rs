//! Acquires several mutexes at once, always in the same global order, so
//! that threads locking overlapping sets of mutexes can never deadlock
//! against each other.

use std::sync::{Mutex, MutexGuard};

/// Holds a lock on every mutex passed to [`lock_many`] until dropped.
pub struct LockMany<'a, T> {
    guards: Vec<MutexGuard<'a, T>>,
}

impl<'a, T> LockMany<'a, T> {
    pub fn guards(&self) -> &[MutexGuard<'a, T>] {
        &self.guards
    }

    pub fn guards_mut(&mut self) -> &mut [MutexGuard<'a, T>] {
        &mut self.guards
    }
}

/// Locks every mutex in `mutexes`, in order of ascending address, and
/// returns a guard holding all of them. Ordering by address (rather than by
/// the caller-provided iteration order) is what makes this deadlock-free:
/// any two threads calling `lock_many` over overlapping mutex sets will
/// always attempt to acquire the shared ones in the same relative order.
pub fn lock_many<'a, T>(mutexes: impl IntoIterator<Item = &'a Mutex<T>>) -> LockMany<'a, T> {
    let mut ordered: Vec<&Mutex<T>> = mutexes.into_iter().collect();
    ordered.sort_by_key(|m| *m as *const Mutex<T> as usize);
    let guards = ordered.into_iter().map(|m| m.lock().unwrap()).collect();
    LockMany { guards }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn locks_all_and_holds_until_drop() {
        let a = Mutex::new(1);
        let b = Mutex::new(2);
        let locked = lock_many([&a, &b]);
        assert!(a.try_lock().is_err());
        assert!(b.try_lock().is_err());
        drop(locked);
        assert!(a.try_lock().is_ok());
        assert!(b.try_lock().is_ok());
    }

    #[test]
    fn concurrent_overlapping_acquisitions_do_not_deadlock() {
        let a = Arc::new(Mutex::new(0));
        let b = Arc::new(Mutex::new(0));

        let (a1, b1) = (a.clone(), b.clone());
        let t1 = thread::spawn(move || {
            for _ in 0..200 {
                let _l = lock_many([a1.as_ref(), b1.as_ref()]);
            }
        });
        let (a2, b2) = (a.clone(), b.clone());
        let t2 = thread::spawn(move || {
            for _ in 0..200 {
                // Reversed argument order: still locks in address order.
                let _l = lock_many([b2.as_ref(), a2.as_ref()]);
            }
        });
        t1.join().unwrap();
        t2.join().unwrap();
    }
}
