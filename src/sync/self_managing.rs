//! Mixin granting an object shared-ownership lifetime it can extend or
//! release from the inside, under a per-object mutex that issues RAII lock
//! tokens used as proof of exclusive access by callers elsewhere in the
//! crate (`PromiseState`, `StreamState`).
//!
//! Rust has no `enable_shared_from_this`; the equivalent here is a `Weak<S>`
//! captured at construction time (via [`std::sync::Arc::new_cyclic`]) that
//! [`EnsureLocked::make_immortal`] upgrades into a strong self-reference.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

pub struct SelfManaging<S> {
    weak_self: Weak<S>,
    self_reference: Mutex<Option<Arc<S>>>,
}

impl<S> SelfManaging<S> {
    pub fn new(weak_self: Weak<S>) -> Self {
        Self {
            weak_self,
            self_reference: Mutex::new(None),
        }
    }

    /// Acquires the per-object lock, returning a token that proves it to
    /// every method elsewhere in the crate that requires `ensure_locked`.
    pub fn get_lock(&self) -> EnsureLocked<'_, S> {
        EnsureLocked {
            guard: Some(self.self_reference.lock().unwrap()),
            owner: self,
        }
    }
}

/// Proof that [`SelfManaging`]'s mutex is held by the current thread.
/// Threaded through `PromiseState`/`StreamState` methods as a pass-through
/// argument, the same way the original's `ensure_locked` reference works.
pub struct EnsureLocked<'a, S> {
    guard: Option<MutexGuard<'a, Option<Arc<S>>>>,
    owner: &'a SelfManaging<S>,
}

impl<'a, S> EnsureLocked<'a, S> {
    /// Installs a strong self-reference, keeping the object alive even if
    /// every external handle is dropped.
    pub fn make_immortal(&mut self) {
        let strong = self
            .owner
            .weak_self
            .upgrade()
            .expect("make_immortal called after the object was already destroyed");
        *self.guard.as_mut().expect("guard held for the lifetime of self") = Some(strong);
    }

    /// Clears the self-reference, letting the object die with its last
    /// external handle. Releases the mutex *before* dropping the
    /// self-reference, so the mutex is never destroyed while still locked
    /// (which would happen if dropping the self-reference causes `S`, and
    /// with it this very mutex, to be dropped while still held).
    pub fn make_mortal(mut self) {
        let mut guard = self.guard.take().expect("guard held for the lifetime of self");
        let strong = guard.take();
        drop(guard);
        drop(strong);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget {
        mgmt: SelfManaging<Widget>,
    }

    impl Widget {
        fn new() -> Arc<Self> {
            Arc::new_cyclic(|weak| Widget {
                mgmt: SelfManaging::new(weak.clone()),
            })
        }
    }

    #[test]
    fn immortal_keeps_object_alive_after_external_drop() {
        let widget = Widget::new();
        let weak = Arc::downgrade(&widget);

        let mut lock = widget.mgmt.get_lock();
        lock.make_immortal();
        drop(lock);

        drop(widget);
        assert!(weak.upgrade().is_some(), "self-reference should keep it alive");

        let widget = weak.upgrade().unwrap();
        let lock = widget.mgmt.get_lock();
        lock.make_mortal();
        drop(widget);
        assert!(weak.upgrade().is_none(), "clearing self-reference should allow drop");
    }

    #[test]
    fn mortal_by_default_drops_normally() {
        let widget = Widget::new();
        let weak = Arc::downgrade(&widget);
        drop(widget);
        assert!(weak.upgrade().is_none());
    }
}
