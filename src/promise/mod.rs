//! Single-assignment promises: a value that is either pending, settled with
//! a success, or settled with a failure, with a chain of continuations built
//! up via `then`/`except`/`finally`.
//!
//! Rust has no way to dispatch on a closure's return type at the `then` call
//! site the way the original's overload set does (a closure returning `U` vs
//! one returning `Promise<U>`), so the continuation result is made explicit
//! via [`Continuation`] instead of inferred: a callback that wants to chain
//! onto a nested promise returns `Continuation::Forward(that_promise)`
//! rather than the promise itself.

pub mod combinators;
pub mod factory;

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use crate::error::{Failure, ProgrammingError, panic_payload_to_failure};

/// What a `then`/`except` callback produced: a plain value, or a nested
/// promise this step should forward to instead of settling directly.
pub enum Continuation<U> {
    Value(U),
    Forward(Promise<U>),
}

enum Phase {
    Pending,
    Resolved,
    Rejected,
    Completed,
}

struct Cell<T> {
    phase: Phase,
    value: Option<T>,
    failure: Option<Failure>,
    bound: bool,
    callback: Option<Box<dyn FnOnce(Result<T, Failure>) + Send>>,
}

impl<T> Drop for Cell<T> {
    fn drop(&mut self) {
        if self.bound && !matches!(self.phase, Phase::Completed) {
            ProgrammingError::DroppedWhileBound.check();
        }
    }
}

/// A single-assignment value shared between a producer (`resolve`/`reject`)
/// and a consumer (`then`/`except`/`finally`/`forward_to`/`finish`).
///
/// Cloning a `Promise` clones the handle, not the state — both clones refer
/// to the same underlying cell, the way a `shared_ptr` copy would.
pub struct Promise<T> {
    inner: Arc<Mutex<Cell<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> Promise<T> {
    /// A fresh, unsettled promise with no callback bound yet.
    pub fn pending() -> Self {
        Promise {
            inner: Arc::new(Mutex::new(Cell {
                phase: Phase::Pending,
                value: None,
                failure: None,
                bound: false,
                callback: None,
            })),
        }
    }

    /// An already-resolved promise.
    pub fn resolved(value: T) -> Self {
        let promise = Self::pending();
        promise.resolve(value);
        promise
    }

    /// An already-rejected promise.
    pub fn rejected(failure: Failure) -> Self {
        let promise = Self::pending();
        promise.reject(failure);
        promise
    }

    /// Settles this promise with a value. A promise that is not pending
    /// cannot be resolved again; attempting to do so is a programming error.
    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    /// Settles this promise with a failure. A promise that is not pending
    /// cannot be rejected again; attempting to do so is a programming error.
    pub fn reject(&self, failure: Failure) {
        self.settle(Err(failure));
    }

    fn settle(&self, outcome: Result<T, Failure>) {
        let mut cell = self.inner.lock().unwrap();
        if !matches!(cell.phase, Phase::Pending) {
            drop(cell);
            ProgrammingError::AlreadySettled.check();
            return;
        }
        if let Some(callback) = cell.callback.take() {
            cell.phase = Phase::Completed;
            drop(cell);
            callback(outcome);
        } else {
            match outcome {
                Ok(value) => {
                    cell.phase = Phase::Resolved;
                    cell.value = Some(value);
                }
                Err(failure) => {
                    cell.phase = Phase::Rejected;
                    cell.failure = Some(failure);
                }
            }
        }
    }

    /// Binds the single callback this promise will ever fire, either
    /// immediately (if already settled) or when `resolve`/`reject` is next
    /// called. Rebinding is a programming error.
    fn bind(&self, callback: Box<dyn FnOnce(Result<T, Failure>) + Send>) {
        let mut cell = self.inner.lock().unwrap();
        if cell.bound {
            drop(cell);
            ProgrammingError::CallbacksAlreadyBound.check();
            return;
        }
        cell.bound = true;
        match cell.phase {
            Phase::Pending => {
                cell.callback = Some(callback);
            }
            Phase::Resolved => {
                cell.phase = Phase::Completed;
                let value = cell.value.take().expect("resolved cell carries a value");
                drop(cell);
                callback(Ok(value));
            }
            Phase::Rejected => {
                cell.phase = Phase::Completed;
                let failure = cell.failure.take().expect("rejected cell carries a failure");
                drop(cell);
                callback(Err(failure));
            }
            Phase::Completed => unreachable!("a promise cannot be completed before being bound"),
        }
    }

    /// Low-level hook: observe this promise's outcome without producing a
    /// new chained promise. Used internally by the combinators and by
    /// `Stream`'s completion wiring, and exposed publicly for callers that
    /// want to inspect a `Result<T, Failure>` directly instead of going
    /// through `then`/`except`.
    pub fn on_settle(&self, callback: impl FnOnce(Result<T, Failure>) + Send + 'static) {
        self.bind(Box::new(callback));
    }

    /// Maps a resolved value through `next`, or forwards the current
    /// rejection unchanged. A panic inside `next` rejects the returned
    /// promise instead of unwinding.
    pub fn then<U: Send + 'static>(
        &self,
        next: impl FnOnce(T) -> Continuation<U> + Send + 'static,
    ) -> Promise<U> {
        self.then_with(next, |failure| Continuation::Forward(Promise::rejected(failure)))
    }

    /// The general form: maps a resolved value through `next` and a
    /// rejection through `handler`, either of which may forward to a nested
    /// promise instead of settling immediately. Equivalent to `then`
    /// followed by `except`, folded into one step.
    pub fn then_with<U: Send + 'static>(
        &self,
        next: impl FnOnce(T) -> Continuation<U> + Send + 'static,
        handler: impl FnOnce(Failure) -> Continuation<U> + Send + 'static,
    ) -> Promise<U> {
        let chained = Promise::pending();
        let out = chained.clone();
        self.bind(Box::new(move |outcome| {
            let step = match outcome {
                Ok(value) => std::panic::catch_unwind(AssertUnwindSafe(move || next(value))),
                Err(failure) => std::panic::catch_unwind(AssertUnwindSafe(move || handler(failure))),
            };
            match step {
                Ok(Continuation::Value(value)) => out.resolve(value),
                Ok(Continuation::Forward(nested)) => nested.forward_to(out),
                Err(payload) => out.reject(panic_payload_to_failure(payload)),
            }
        }));
        chained
    }

    /// Recovers from a rejection; a resolved value passes through
    /// unchanged.
    pub fn except(
        &self,
        handler: impl FnOnce(Failure) -> Continuation<T> + Send + 'static,
    ) -> Promise<T> {
        self.then_with(Continuation::Value, handler)
    }

    /// Runs `finalizer` regardless of outcome, then passes the original
    /// outcome through unchanged. If `finalizer` panics, the returned
    /// promise rejects with that failure instead, overriding whatever the
    /// original outcome was.
    pub fn finally(&self, finalizer: impl FnOnce() + Send + 'static) -> Promise<T> {
        let chained = Promise::pending();
        let out = chained.clone();
        self.bind(Box::new(move |outcome| {
            match std::panic::catch_unwind(AssertUnwindSafe(finalizer)) {
                Ok(()) => match outcome {
                    Ok(value) => out.resolve(value),
                    Err(failure) => out.reject(failure),
                },
                Err(payload) => out.reject(panic_payload_to_failure(payload)),
            }
        }));
        chained
    }

    /// Installs a callback on this promise that resolves/rejects `target`
    /// with the same outcome. Used both internally (a continuation that
    /// forwards to a nested promise) and by callers splicing two
    /// independently-created promises together.
    pub fn forward_to(&self, target: Promise<T>) {
        self.bind(Box::new(move |outcome| match outcome {
            Ok(value) => target.resolve(value),
            Err(failure) => target.reject(failure),
        }));
    }

    /// Marks this promise as a terminator: binds a callback that silently
    /// observes (and discards) the final outcome. Use at the end of any
    /// chain whose rejection would otherwise go unobserved, to avoid the
    /// debug-mode "dropped while bound" check firing.
    pub fn finish(&self) {
        self.bind(Box::new(|_outcome| {}));
    }
}
