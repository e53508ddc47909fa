//! Buffered producer/consumer sequences whose completion is itself a
//! promise.
//!
//! A [`Stream<R, D>`] is written to by a producer (`write`/`resolve`/
//! `reject`) and read by a single consumer (`stream`/`discard`/`stop`/
//! `forward_to`). The consumer replies to each datum with an [`Action`]
//! that controls whether delivery continues, is silently discarded, or asks
//! the producer to stop; the stream's own completion is exposed as a
//! [`Promise<R>`] that settles only once the producer has set a result, the
//! buffer has drained, and the consumer is idle.
//!
//! Like [`Promise`](crate::promise::Promise), at most one consumer chain may
//! ever be bound (`stream`/`discard`/`stop`/`forward_to`); rebinding, or
//! dropping a stream that never completed, is a programming error in debug
//! builds.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use crate::error::{Failure, ProgrammingError, panic_payload_to_failure};
use crate::promise::{Continuation, Promise};

/// The consumer's reply to one datum, controlling subsequent delivery and
/// signalling the producer.
///
/// `Discard` and `Stop` both cause every later datum to be dropped without
/// ever reaching the consumer again. The only difference is visibility:
/// [`Stream::stop_requested`] reports `true` only after `Stop`, giving the
/// producer something to poll and voluntarily act on. A producer that
/// ignores it behaves exactly as if `Discard` had been returned instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Discard,
    Stop,
}

/// What the producer side has settled to, if anything. `ConsumerFailed`
/// always wins over a later producer `resolve`, even though the producer
/// isn't aware the consumer has already failed (see [`Stream::resolve`]).
enum ProducerOutcome<R> {
    None,
    Resolved(R),
    Rejected(Failure),
    ConsumerFailed(Failure),
}

type ConsumerFn<D> = Box<dyn FnMut(D) -> Promise<Action> + Send>;

struct Cell<R, D> {
    written: bool,
    completed: bool,
    bound: bool,
    buffer: VecDeque<D>,
    consumer: Option<ConsumerFn<D>>,
    consumer_running: bool,
    consumer_action: Action,
    producer_outcome: ProducerOutcome<R>,
    result: Promise<R>,
}

impl<R, D> Drop for Cell<R, D> {
    fn drop(&mut self) {
        if self.bound && !self.completed {
            ProgrammingError::DroppedWhileBound.check();
        }
    }
}

/// The five-state machine from the data model, computed from the cell's
/// flags rather than stored redundantly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Streaming1,
    Streaming2,
    Streaming3,
    Completed,
}

/// A shareable handle to a buffered deferred sequence with a terminal
/// result. Cloning shares the same underlying state, like [`Promise`].
pub struct Stream<R, D> {
    inner: Arc<Mutex<Cell<R, D>>>,
}

impl<R, D> Clone for Stream<R, D> {
    fn clone(&self) -> Self {
        Stream { inner: self.inner.clone() }
    }
}

impl<R: Send + 'static, D: Send + 'static> Stream<R, D> {
    /// A fresh stream with an empty buffer, no consumer, and no producer
    /// outcome yet.
    pub fn pending() -> Self {
        Stream {
            inner: Arc::new(Mutex::new(Cell {
                written: false,
                completed: false,
                bound: false,
                buffer: VecDeque::new(),
                consumer: None,
                consumer_running: false,
                consumer_action: Action::Continue,
                producer_outcome: ProducerOutcome::None,
                result: Promise::pending(),
            })),
        }
    }

    /// The current position in the transition table of §3 of the data
    /// model. Exposed mainly for tests; producers and consumers should
    /// drive behaviour off `write`/`resolve`/`stream` instead of polling
    /// this.
    pub fn phase(&self) -> Phase {
        let cell = self.inner.lock().unwrap();
        if cell.completed {
            Phase::Completed
        } else if matches!(cell.producer_outcome, ProducerOutcome::None) {
            if cell.written { Phase::Streaming1 } else { Phase::Pending }
        } else if !cell.buffer.is_empty() || cell.consumer_running {
            Phase::Streaming2
        } else {
            Phase::Streaming3
        }
    }

    /// Appends a datum for the consumer. Silently dropped if the consumer
    /// has already replied `Discard`/`Stop` to a previous datum, or if the
    /// producer has already settled a result.
    pub fn write(&self, datum: D) {
        let mut cell = self.inner.lock().unwrap();
        if !matches!(cell.producer_outcome, ProducerOutcome::None) {
            return;
        }
        cell.written = true;
        if !matches!(cell.consumer_action, Action::Continue) {
            return;
        }
        cell.buffer.push_back(datum);
        self.pump(cell);
    }

    /// Settles the producer side with a success. Ignored if the consumer
    /// has already failed (`ConsumerFailed` takes precedence); a
    /// programming error if the producer has already settled otherwise.
    pub fn resolve(&self, value: R) {
        self.settle_producer(ProducerOutcome::Resolved(value));
    }

    /// Settles the producer side with a failure. Same precedence rules as
    /// [`resolve`](Self::resolve).
    pub fn reject(&self, failure: Failure) {
        self.settle_producer(ProducerOutcome::Rejected(failure));
    }

    fn settle_producer(&self, outcome: ProducerOutcome<R>) {
        let mut cell = self.inner.lock().unwrap();
        if matches!(cell.producer_outcome, ProducerOutcome::ConsumerFailed(_)) {
            return;
        }
        if !matches!(cell.producer_outcome, ProducerOutcome::None) {
            drop(cell);
            ProgrammingError::AlreadySettled.check();
            return;
        }
        cell.producer_outcome = outcome;
        self.pump(cell);
    }

    /// `true` once the consumer has replied `Stop` to some datum. A
    /// cooperative signal only: the producer must poll it and choose to
    /// stop producing.
    pub fn stop_requested(&self) -> bool {
        matches!(self.inner.lock().unwrap().consumer_action, Action::Stop)
    }

    fn bind_consumer(&self, consumer: ConsumerFn<D>) {
        let mut cell = self.inner.lock().unwrap();
        if cell.bound {
            drop(cell);
            ProgrammingError::CallbacksAlreadyBound.check();
            return;
        }
        cell.bound = true;
        cell.consumer = Some(consumer);
        self.pump(cell);
    }

    /// Drives buffered data into the consumer (dropping the cell's lock
    /// before calling into user code) and settles the result promise once
    /// the producer is done, the buffer is empty, and the consumer is
    /// idle. `cell` is consumed; on every path either it is dropped before
    /// this returns, or control has been handed to a promise continuation
    /// that will call back in with a fresh lock.
    fn pump(&self, mut cell: std::sync::MutexGuard<'_, Cell<R, D>>) {
        loop {
            if cell.completed || cell.consumer_running {
                return;
            }
            if matches!(cell.consumer_action, Action::Continue) {
                if let Some(datum) = cell.buffer.pop_front() {
                    match cell.consumer.take() {
                        Some(mut consumer) => {
                            cell.consumer_running = true;
                            drop(cell);
                            let next = match std::panic::catch_unwind(AssertUnwindSafe(|| consumer(datum))) {
                                Ok(promise) => promise,
                                Err(payload) => Promise::rejected(panic_payload_to_failure(payload)),
                            };
                            let this = self.clone();
                            next.on_settle(move |outcome| {
                                let mut cell = this.inner.lock().unwrap();
                                cell.consumer_running = false;
                                match outcome {
                                    Ok(action) => {
                                        if !matches!(action, Action::Continue) {
                                            cell.consumer_action = action;
                                        }
                                        cell.consumer = Some(consumer);
                                    }
                                    Err(failure) => {
                                        // No consumer is left to feed (it was
                                        // never handed back), so any data
                                        // still buffered would otherwise wait
                                        // forever for a `consumer.take()` that
                                        // can never succeed again.
                                        cell.buffer.clear();
                                        cell.producer_outcome = ProducerOutcome::ConsumerFailed(failure);
                                    }
                                }
                                this.pump(cell);
                            });
                            return;
                        }
                        None => {
                            cell.buffer.push_front(datum);
                            return;
                        }
                    }
                }
            } else {
                cell.buffer.clear();
            }
            if matches!(cell.producer_outcome, ProducerOutcome::None) {
                return;
            }
            let outcome = std::mem::replace(&mut cell.producer_outcome, ProducerOutcome::None);
            cell.completed = true;
            let result = cell.result.clone();
            drop(cell);
            match outcome {
                ProducerOutcome::Resolved(value) => result.resolve(value),
                ProducerOutcome::Rejected(failure) | ProducerOutcome::ConsumerFailed(failure) => {
                    result.reject(failure)
                }
                ProducerOutcome::None => unreachable!("checked above"),
            }
            return;
        }
    }

    /// Binds a consumer that replies with a promise of the next
    /// [`Action`]. No second invocation of `consumer` starts until the
    /// promise from the previous one has settled, so at most one is ever
    /// running at a time.
    pub fn stream<F>(&self, consumer: F) -> Promise<R>
    where
        F: FnMut(D) -> Promise<Action> + Send + 'static,
    {
        let result = self.inner.lock().unwrap().result.clone();
        self.bind_consumer(Box::new(consumer));
        result
    }

    /// Binds a consumer that replies with an [`Action`] directly, with no
    /// asynchronous step between data items.
    pub fn stream_sync<F>(&self, mut consumer: F) -> Promise<R>
    where
        F: FnMut(D) -> Action + Send + 'static,
    {
        self.stream(move |datum| Promise::resolved(consumer(datum)))
    }

    /// A sink consumer: always continues, and produces no value of its own
    /// for each datum.
    pub fn for_each<F>(&self, mut consumer: F) -> Promise<R>
    where
        F: FnMut(D) + Send + 'static,
    {
        self.stream_sync(move |datum| {
            consumer(datum);
            Action::Continue
        })
    }

    /// A stateful consumer owned by the stream for the duration of the
    /// chain. Returns `(finalState, producerResult)` once the stream
    /// completes.
    pub fn stream_with_state<S, F>(&self, initial: S, mut consumer: F) -> Promise<(S, R)>
    where
        S: Send + 'static,
        F: FnMut(&mut S, D) -> Action + Send + 'static,
    {
        let state = Arc::new(Mutex::new(Some(initial)));
        let state_for_consume = state.clone();
        let result = self.stream_sync(move |datum| {
            let mut guard = state_for_consume.lock().unwrap();
            let state = guard.as_mut().expect("state taken before stream completed");
            consumer(state, datum)
        });
        result.then(move |value| {
            let state = state.lock().unwrap().take().expect("state taken exactly once");
            Continuation::Value((state, value))
        })
    }

    /// Like [`stream_with_state`](Self::stream_with_state), but the
    /// consumer itself replies with a promise of the next action.
    pub fn stream_with_state_async<S, F>(&self, initial: S, mut consumer: F) -> Promise<(S, R)>
    where
        S: Send + 'static,
        F: FnMut(&mut S, D) -> Promise<Action> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(Some(initial)));
        let state_for_consume = state.clone();
        let result = self.stream(move |datum| {
            let mut guard = state_for_consume.lock().unwrap();
            let state = guard.as_mut().expect("state taken before stream completed");
            consumer(state, datum)
        });
        result.then(move |value| {
            let state = state.lock().unwrap().take().expect("state taken exactly once");
            Continuation::Value((state, value))
        })
    }

    /// Consumes and ignores every datum, forwarding only the final result.
    pub fn discard(&self) -> Promise<R> {
        self.for_each(|_datum: D| {})
    }

    /// Like [`discard`](Self::discard), but also asks the producer to stop
    /// by pre-setting the stop-requested flag, as if the first datum (if
    /// any arrives) were answered with `Stop`.
    pub fn stop(&self) -> Promise<R> {
        let mut cell = self.inner.lock().unwrap();
        cell.consumer_action = Action::Stop;
        drop(cell);
        self.discard()
    }

    /// Consumes and ignores every datum, forwarding this stream's result to
    /// `target`.
    pub fn forward_to(&self, target: Promise<R>) {
        self.discard().forward_to(target);
    }

    /// Re-streams every datum into `target` and forwards this stream's
    /// result to it as well.
    pub fn pipe_to(&self, target: Stream<R, D>) {
        let target_for_data = target.clone();
        self.for_each(move |datum| target_for_data.write(datum)).on_settle(move |outcome| {
            match outcome {
                Ok(value) => target.resolve(value),
                Err(failure) => target.reject(failure),
            }
        });
    }
}
