//! Throughput of `task()`-dispatched work across pools.
//!
//! ```text
//! ┌──────────────┐         ┌──────────────┐
//! │  Calculation │ ──────► │   Reactor    │
//! │  (action)    │  N      │  (reaction)  │
//! │  pool        │  jobs   │  pool        │
//! └──────────────┘         └──────────────┘
//! ```
//!
//! Each iteration dispatches `N` independent `task()` calls onto the
//! calculation pool and waits (via `join`) for every reaction to land on the
//! reactor pool, so the measured cost is round-trip dispatch overhead, not
//! the trivial work itself.

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use kaiu::{ParallelEventLoop, Pool, Promise, SharedEventLoop, task};

const BATCH: usize = 1_000;

fn dispatch_batch(loop_: &SharedEventLoop, factory: &impl Fn(&SharedEventLoop, u64) -> Promise<u64>) {
    let mut pending: Vec<Promise<u64>> = Vec::with_capacity(BATCH);
    for n in 0..BATCH as u64 {
        pending.push(factory(loop_, n));
    }
    for promise in pending {
        promise.finish();
    }
}

fn bench_dispatch(c: &mut Criterion) {
    let parallel =
        Arc::new(ParallelEventLoop::new([(Pool::Calculation, 4), (Pool::Reactor, 2)]).unwrap());
    let loop_: SharedEventLoop = parallel.clone();
    let factory = task(|n: u64| Promise::resolved(n * 2), Pool::Calculation, Pool::Reactor);

    c.bench_function("task_dispatch_batch_1000", |b| {
        b.iter(|| {
            dispatch_batch(&loop_, &factory);
            parallel.join(None);
        });
    });
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
