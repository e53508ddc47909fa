//! Wrapping a synchronous function as a promise.
//!
//! `factory(f)(args)` invokes `f` synchronously and captures the outcome
//! into an already-settled promise: its return value if `f` returns
//! normally, or the panic payload (converted to a [`Failure`]) if `f`
//! unwinds. `try_from_fn` is the Rust-native counterpart for functions that
//! report failure through `Result` rather than by panicking — idiomatic
//! Rust code reserves panics for bugs, so most real factories should prefer
//! this form over relying on `from_fn`'s panic capture.
//!
//! `factory(nullptr)` from the original has no Rust equivalent worth keeping
//! (a closure can't be null) and is not implemented.

use std::panic::AssertUnwindSafe;

use super::Promise;
use crate::error::{Failure, panic_payload_to_failure};

/// Resolves immediately with `value`.
pub fn resolved<T: Send + 'static>(value: T) -> Promise<T> {
    Promise::resolved(value)
}

/// Rejects immediately with `failure`.
pub fn rejected<T: Send + 'static>(failure: Failure) -> Promise<T> {
    Promise::rejected(failure)
}

/// Invokes `f(args)` synchronously; a normal return resolves the promise, a
/// panic inside `f` rejects it.
pub fn from_fn<T, Args>(f: impl FnOnce(Args) -> T + Send + 'static, args: Args) -> Promise<T>
where
    T: Send + 'static,
    Args: Send + 'static,
{
    match std::panic::catch_unwind(AssertUnwindSafe(move || f(args))) {
        Ok(value) => Promise::resolved(value),
        Err(payload) => Promise::rejected(panic_payload_to_failure(payload)),
    }
}

/// Invokes `f(args)` synchronously; `Ok`/`Err` map directly to
/// resolve/reject, and a panic inside `f` is still captured as a rejection.
pub fn try_from_fn<T, Args>(
    f: impl FnOnce(Args) -> Result<T, Failure> + Send + 'static,
    args: Args,
) -> Promise<T>
where
    T: Send + 'static,
    Args: Send + 'static,
{
    match std::panic::catch_unwind(AssertUnwindSafe(move || f(args))) {
        Ok(Ok(value)) => Promise::resolved(value),
        Ok(Err(failure)) => Promise::rejected(failure),
        Err(payload) => Promise::rejected(panic_payload_to_failure(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn from_fn_resolves_with_the_return_value() {
        let result = Arc::new(Mutex::new(None));
        let r2 = result.clone();
        from_fn(|x: i32| x * 2, 21).on_settle(move |outcome| *r2.lock().unwrap() = outcome.ok());
        assert_eq!(*result.lock().unwrap(), Some(42));
    }

    #[test]
    fn from_fn_rejects_on_panic() {
        let result = Arc::new(Mutex::new(None));
        let r2 = result.clone();
        from_fn(|_: ()| -> i32 { panic!("nope") }, ())
            .on_settle(move |outcome| *r2.lock().unwrap() = Some(outcome.is_err()));
        assert_eq!(*result.lock().unwrap(), Some(true));
    }

    #[test]
    fn try_from_fn_rejects_on_explicit_err() {
        let result = Arc::new(Mutex::new(None));
        let r2 = result.clone();
        try_from_fn(
            |x: i32| if x < 0 { Err(crate::error::failure_from("negative")) } else { Ok(x) },
            -1,
        )
        .on_settle(move |outcome: Result<i32, Failure>| *r2.lock().unwrap() = Some(outcome.is_err()));
        assert_eq!(*result.lock().unwrap(), Some(true));
    }
}
