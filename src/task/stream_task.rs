//! Pool-aware wrapper around stream factories: the stream-shaped sibling of
//! [`task`](super::task).

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use super::SharedEventLoop;
use crate::error::panic_payload_to_failure;
use crate::event_loop::EventLoop;
use crate::pool::Pool;
use crate::promise::Promise;
use crate::stream::{Action, Stream};

/// A stream-producing factory wrapped with its three pools. Built by
/// [`task_stream`]; binds a consumer via [`StreamTask::stream`].
pub struct StreamTask<R, D> {
    stream: Stream<R, D>,
    consumer_pool: Pool,
    reaction_pool: Pool,
    loop_: SharedEventLoop,
}

impl<R: Send + 'static, D: Send + 'static> StreamTask<R, D> {
    /// Binds `consumer`, dispatching every invocation onto this task's
    /// consumer pool (so no two invocations of the same consumer ever run
    /// concurrently, and never on the thread that called `write`). The
    /// returned promise settles on this task's reaction pool.
    pub fn stream<F>(&self, consumer: F) -> Promise<R>
    where
        F: FnMut(D) -> Action + Send + 'static,
    {
        let consumer = Arc::new(Mutex::new(consumer));
        let loop_for_consumer = self.loop_.clone();
        let consumer_pool = self.consumer_pool;

        let result = self.stream.stream(move |datum: D| {
            let action_promise = Promise::pending();
            let out = action_promise.clone();
            let consumer = consumer.clone();
            loop_for_consumer.push_to(
                consumer_pool,
                Box::new(move |_loop_ref: &dyn EventLoop| {
                    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                        let mut consumer = consumer.lock().unwrap();
                        (consumer)(datum)
                    }));
                    match outcome {
                        Ok(action) => out.resolve(action),
                        Err(payload) => out.reject(panic_payload_to_failure(payload)),
                    }
                }),
            );
            action_promise
        });

        self.forward_via_reaction(result)
    }

    /// Consumes and ignores every datum (dispatched the same as
    /// [`stream`](Self::stream)), forwarding only the final result.
    pub fn discard(&self) -> Promise<R> {
        self.stream(|_datum: D| Action::Continue)
    }

    fn forward_via_reaction(&self, result: Promise<R>) -> Promise<R> {
        let outer = Promise::pending();
        let out = outer.clone();
        let loop_for_reaction = self.loop_.clone();
        // `Same` resolves to the consumer pool: that's the pool the last
        // dispatched step (the consumer invocation that drove completion)
        // actually ran on, the stream analogue of a plain task's
        // action-pool fallback.
        let resolved_reaction =
            if self.reaction_pool == Pool::Same { self.consumer_pool } else { self.reaction_pool };

        result.on_settle(move |outcome| {
            loop_for_reaction.push_to(
                resolved_reaction,
                Box::new(move |_| match outcome {
                    Ok(value) => out.resolve(value),
                    Err(failure) => out.reject(failure),
                }),
            );
        });

        outer
    }
}

/// Wraps `factory` so that invoking the returned callable enqueues the
/// synchronous call -- and hence every `write`/`resolve`/`reject` the
/// factory performs directly -- onto `producer_pool`. The returned
/// [`StreamTask`] lets the caller bind a consumer whose invocations run on
/// `consumer_pool`, with final settlement delivered on `reaction_pool`.
pub fn task_stream<Args, R, D, F>(
    factory: F,
    producer_pool: Pool,
    consumer_pool: Pool,
    reaction_pool: Pool,
) -> impl Fn(&SharedEventLoop, Args) -> StreamTask<R, D>
where
    Args: Send + 'static,
    R: Send + 'static,
    D: Send + 'static,
    F: Fn(Args) -> Stream<R, D> + Send + Sync + 'static,
{
    let factory = Arc::new(factory);
    move |loop_: &SharedEventLoop, args: Args| {
        let stream: Stream<R, D> = Stream::pending();
        let stream_for_job = stream.clone();
        let factory = factory.clone();

        loop_.push_to(
            producer_pool,
            Box::new(move |_loop_ref: &dyn EventLoop| {
                let produced = match std::panic::catch_unwind(AssertUnwindSafe(|| factory(args))) {
                    Ok(produced) => produced,
                    Err(payload) => {
                        stream_for_job.reject(panic_payload_to_failure(payload));
                        return;
                    }
                };
                produced.pipe_to(stream_for_job);
            }),
        );

        StreamTask {
            stream,
            consumer_pool,
            reaction_pool,
            loop_: loop_.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::{ParallelEventLoop, current_pool};
    use std::sync::Mutex as StdMutex;

    #[test]
    fn stream_task_dispatches_producer_and_consumer_to_their_own_pools() {
        let parallel =
            Arc::new(ParallelEventLoop::new([(Pool::IoLocal, 1), (Pool::Interaction, 1)]).unwrap());
        let loop_: SharedEventLoop = parallel.clone();

        let producer_pool_seen = Arc::new(StdMutex::new(None));
        let producer_pool_seen2 = producer_pool_seen.clone();

        let make = task_stream(
            move |words: Vec<&'static str>| {
                let stream: Stream<i32, &'static str> = Stream::pending();
                *producer_pool_seen2.lock().unwrap() = Some(current_pool());
                let count = words.len() as i32;
                // Emulate the producer doing its writes inline, on whatever
                // pool the surrounding job (producer_pool) is running on.
                for word in words {
                    stream.write(word);
                }
                stream.resolve(count);
                stream
            },
            Pool::IoLocal,
            Pool::Interaction,
            Pool::Same,
        );

        let seen_pools = Arc::new(StdMutex::new(Vec::new()));
        let seen_words = Arc::new(StdMutex::new(Vec::new()));
        let seen_pools2 = seen_pools.clone();
        let seen_words2 = seen_words.clone();

        let handle = make(&loop_, vec!["a", "b", "c"]);
        let result = handle.stream(move |datum: &str| {
            seen_pools2.lock().unwrap().push(current_pool());
            seen_words2.lock().unwrap().push(datum.to_string());
            Action::Continue
        });

        let seen_result = Arc::new(StdMutex::new(None));
        let seen_result2 = seen_result.clone();
        result.on_settle(move |outcome| *seen_result2.lock().unwrap() = outcome.ok());

        parallel.join(Some(&mut |_| {}));

        assert_eq!(*producer_pool_seen.lock().unwrap(), Some(Pool::IoLocal));
        assert_eq!(*seen_words.lock().unwrap(), vec!["a", "b", "c"]);
        assert!(
            seen_pools.lock().unwrap().iter().all(|p| *p == Pool::Interaction),
            "every consumer invocation must run on the consumer pool"
        );
        assert_eq!(*seen_result.lock().unwrap(), Some(3));
    }
}
