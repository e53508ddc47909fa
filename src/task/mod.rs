//! Pool-aware wrappers around promise and stream factories.
//!
//! [`task`] takes a plain `Fn(Args) -> Promise<R>` factory and an action/
//! reaction pool pair, and produces a new factory that dispatches the
//! synchronous call onto the action pool and the settlement-driven
//! continuation onto the reaction pool, instead of running both on whatever
//! thread happens to invoke it. [`stream_task`] is the analogous wrapper for
//! stream factories, adding a third pool for consumer dispatch.
//!
//! Binding a particular event loop to the returned factory (to get an
//! ergonomic `Fn(Args) -> Promise<R>` callable) is a plain closure around
//! the loop reference -- currying is explicitly out of scope for this
//! crate, the same way it is for the design this is modeled on.

pub mod stream_task;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::error::panic_payload_to_failure;
use crate::event_loop::{EventLoop, current_pool};
use crate::pool::Pool;
use crate::promise::Promise;

pub use stream_task::{StreamTask, task_stream};

/// A thread-safe, shared handle to an event loop. A task holds this for as
/// long as it takes the wrapped factory's promise to settle, which may
/// outlive the single job that invoked the factory -- so a borrowed
/// `&dyn EventLoop` (valid only for the duration of one job) isn't enough.
pub type SharedEventLoop = Arc<dyn EventLoop + Send + Sync>;

/// Wraps `factory` so that invoking the returned callable enqueues the
/// synchronous call onto `action_pool`, and -- once the resulting promise
/// settles -- enqueues delivery of that outcome onto `reaction_pool`.
/// `Pool::Same` as `reaction_pool` resolves to whichever pool the action
/// actually ran on.
///
/// A panic inside `factory` itself is captured and rejects the outer
/// promise, the same way a panic inside a `then`/`except` step does.
pub fn task<Args, R, F>(
    factory: F,
    action_pool: Pool,
    reaction_pool: Pool,
) -> impl Fn(&SharedEventLoop, Args) -> Promise<R>
where
    Args: Send + 'static,
    R: Send + 'static,
    F: Fn(Args) -> Promise<R> + Send + Sync + 'static,
{
    let factory = Arc::new(factory);
    move |loop_: &SharedEventLoop, args: Args| {
        let outer = Promise::pending();
        let out = outer.clone();
        let factory = factory.clone();
        let loop_for_reaction = loop_.clone();

        loop_.push_to(
            action_pool,
            Box::new(move |_loop_ref: &dyn EventLoop| {
                let inner = match std::panic::catch_unwind(AssertUnwindSafe(|| factory(args))) {
                    Ok(promise) => promise,
                    Err(payload) => Promise::rejected(panic_payload_to_failure(payload)),
                };
                let running_on = current_pool();
                inner.on_settle(move |outcome| {
                    let resolved_reaction =
                        if reaction_pool == Pool::Same { running_on } else { reaction_pool };
                    loop_for_reaction.push_to(
                        resolved_reaction,
                        Box::new(move |_| match outcome {
                            Ok(value) => out.resolve(value),
                            Err(failure) => out.reject(failure),
                        }),
                    );
                });
            }),
        );

        outer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::ParallelEventLoop;
    use crate::promise::Continuation;
    use std::sync::Mutex;

    fn factorial(n: u64) -> u64 {
        (1..=n).product::<u64>().max(1)
    }

    #[test]
    fn parallel_factorial_computed_off_the_calling_thread() {
        let parallel =
            Arc::new(ParallelEventLoop::new([(Pool::Calculation, 2), (Pool::Reactor, 2)]).unwrap());
        let loop_: SharedEventLoop = parallel.clone();

        let compute = task(|n: u64| Promise::resolved(factorial(n)), Pool::Calculation, Pool::Same);
        let format = task(|n: u64| Promise::resolved(format!("{n}!")), Pool::Reactor, Pool::Same);

        let seen_pool = Arc::new(Mutex::new(None));
        let seen_pool2 = seen_pool.clone();
        let seen_value = Arc::new(Mutex::new(None));
        let seen_value2 = seen_value.clone();

        let loop_for_chain = loop_.clone();
        compute(&loop_, 5)
            .then(move |value: u64| Continuation::Forward(format(&loop_for_chain, value)))
            .then(move |text: String| {
                *seen_pool2.lock().unwrap() = Some(current_pool());
                *seen_value2.lock().unwrap() = Some(text);
                Continuation::Value(())
            })
            .finish();

        let failures = Arc::new(Mutex::new(Vec::new()));
        let f2 = failures.clone();
        parallel.join(Some(&mut |failure| f2.lock().unwrap().push(failure.to_string())));

        assert!(failures.lock().unwrap().is_empty());
        assert_eq!(seen_value.lock().unwrap().as_deref(), Some("120!"));
        assert_eq!(*seen_pool.lock().unwrap(), Some(Pool::Reactor));
    }

    #[test]
    fn factory_panic_rejects_the_outer_promise() {
        let parallel = Arc::new(ParallelEventLoop::new([(Pool::Calculation, 1)]).unwrap());
        let loop_: SharedEventLoop = parallel.clone();
        let compute = task(
            |_: ()| -> Promise<u64> { panic!("factory exploded") },
            Pool::Calculation,
            Pool::Same,
        );
        let seen = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        compute(&loop_, ()).on_settle(move |outcome: Result<u64, _>| {
            *seen2.lock().unwrap() = Some(outcome.is_err())
        });
        parallel.join(Some(&mut |_| {}));
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }
}
