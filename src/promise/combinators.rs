//! Combining several promises into one.
//!
//! Both flavours reject as soon as the first input promise rejects, without
//! waiting for the rest to settle — a late success or failure from one of
//! the other inputs is simply discarded once the combined promise has
//! already settled.

use std::sync::{Arc, Mutex};

use super::Promise;

/// Resolves with every input's value, in input order, once all of them
/// resolve. Rejects with whichever failure is observed first.
pub fn combine<T: Send + 'static>(promises: impl IntoIterator<Item = Promise<T>>) -> Promise<Vec<T>> {
    let promises: Vec<_> = promises.into_iter().collect();
    let out = Promise::pending();
    let count = promises.len();
    if count == 0 {
        out.resolve(Vec::new());
        return out;
    }

    struct Shared<T> {
        slots: Vec<Option<T>>,
        remaining: usize,
        settled: bool,
    }
    let shared = Arc::new(Mutex::new(Shared {
        slots: (0..count).map(|_| None).collect(),
        remaining: count,
        settled: false,
    }));

    for (index, promise) in promises.into_iter().enumerate() {
        let shared = shared.clone();
        let out = out.clone();
        promise.on_settle(move |result| {
            let mut state = shared.lock().unwrap();
            if state.settled {
                return;
            }
            match result {
                Ok(value) => {
                    state.slots[index] = Some(value);
                    state.remaining -= 1;
                    if state.remaining == 0 {
                        state.settled = true;
                        let values = state.slots.iter_mut().map(|slot| slot.take().unwrap()).collect();
                        drop(state);
                        out.resolve(values);
                    }
                }
                Err(failure) => {
                    state.settled = true;
                    drop(state);
                    out.reject(failure);
                }
            }
        });
    }

    out
}

macro_rules! heterogeneous_combine {
    ($name:ident, $arity:literal, [$($slot:ident: $generic:ident @ $index:tt),+ $(,)?]) => {
        #[doc = concat!(
            "Resolves a tuple of all ", $arity,
            " inputs once every one resolves; rejects with whichever ",
            "failure is observed first."
        )]
        pub fn $name<$($generic: Send + 'static),+>(
            $($slot: Promise<$generic>),+
        ) -> Promise<($($generic,)+)> {
            struct Shared<$($generic),+> {
                $($slot: Option<$generic>,)+
                remaining: usize,
                settled: bool,
            }
            let out = Promise::pending();
            let shared = Arc::new(Mutex::new(Shared {
                $($slot: None,)+
                remaining: $arity,
                settled: false,
            }));

            $({
                let shared = shared.clone();
                let out = out.clone();
                $slot.on_settle(move |result| {
                    let mut state = shared.lock().unwrap();
                    if state.settled {
                        return;
                    }
                    match result {
                        Ok(value) => {
                            state.$slot = Some(value);
                            state.remaining -= 1;
                            if state.remaining == 0 {
                                state.settled = true;
                                let tuple = (
                                    $(state.$slot.take().unwrap(),)+
                                );
                                drop(state);
                                out.resolve(tuple);
                            }
                        }
                        Err(failure) => {
                            state.settled = true;
                            drop(state);
                            out.reject(failure);
                        }
                    }
                });
            })+

            out
        }
    };
}

heterogeneous_combine!(combine2, 2, [a: A @ 0, b: B @ 1]);
heterogeneous_combine!(combine3, 3, [a: A @ 0, b: B @ 1, c: C @ 2]);
heterogeneous_combine!(combine4, 4, [a: A @ 0, b: B @ 1, c: C @ 2, d: D @ 3]);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Failure, failure_from};

    #[test]
    fn homogeneous_combine_preserves_order() {
        let result = Arc::new(Mutex::new(None));
        let r2 = result.clone();
        combine([Promise::resolved(1), Promise::resolved(2), Promise::resolved(3)])
            .on_settle(move |outcome: Result<Vec<i32>, Failure>| *r2.lock().unwrap() = outcome.ok());
        assert_eq!(*result.lock().unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn homogeneous_combine_rejects_on_first_failure() {
        let result = Arc::new(Mutex::new(None));
        let r2 = result.clone();
        let rejected: Promise<i32> = Promise::rejected(failure_from("nope"));
        combine([Promise::resolved(1), rejected, Promise::resolved(3)])
            .on_settle(move |outcome: Result<Vec<i32>, Failure>| {
                *r2.lock().unwrap() = Some(outcome.is_err());
            });
        assert_eq!(*result.lock().unwrap(), Some(true));
    }

    #[test]
    fn heterogeneous_combine_resolves_tuple() {
        let result = Arc::new(Mutex::new(None));
        let r2 = result.clone();
        combine2(Promise::resolved(1), Promise::resolved("two"))
            .on_settle(move |outcome: Result<(i32, &'static str), Failure>| {
                *r2.lock().unwrap() = outcome.ok();
            });
        assert_eq!(*result.lock().unwrap(), Some((1, "two")));
    }

    #[test]
    fn heterogeneous_combine_projects_first_component() {
        use super::super::Continuation;
        let result = Arc::new(Mutex::new(None));
        let r2 = result.clone();
        combine2(Promise::resolved(7), Promise::resolved(9))
            .then(move |(a, _b)| {
                *r2.lock().unwrap() = Some(a);
                Continuation::Value(())
            });
        assert_eq!(*result.lock().unwrap(), Some(7));
    }
}
