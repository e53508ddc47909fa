//! Non-threaded event loop that drains to completion before its
//! constructor returns. The pool argument to `push` is ignored — there is
//! only ever one queue and one thread (the caller's).

use std::cell::RefCell;
use std::collections::VecDeque;

use super::{EventLoop, Job};
use crate::pool::Pool;

pub struct SynchronousEventLoop {
    jobs: RefCell<VecDeque<Job>>,
}

impl SynchronousEventLoop {
    /// Pushes `start`, then drains the queue (including anything `start`
    /// and its descendants push) before returning.
    pub fn run(start: Job) {
        let this = Self {
            jobs: RefCell::new(VecDeque::new()),
        };
        this.push(start);
        this.drain();
    }

    fn drain(&self) {
        loop {
            let next = self.jobs.borrow_mut().pop_front();
            match next {
                Some(job) => job(self),
                None => break,
            }
        }
    }
}

impl EventLoop for SynchronousEventLoop {
    fn default_pool(&self) -> Pool {
        Pool::Reactor
    }

    fn push_to(&self, _pool: Pool, job: Job) {
        self.jobs.borrow_mut().push_back(job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn drains_jobs_pushed_during_the_loop() {
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        SynchronousEventLoop::run(Box::new(move |loop_: &dyn EventLoop| {
            o1.lock().unwrap().push(1);
            let o2 = o1.clone();
            loop_.push(Box::new(move |loop_: &dyn EventLoop| {
                o2.lock().unwrap().push(2);
                let o3 = o2.clone();
                loop_.push(Box::new(move |_| o3.lock().unwrap().push(3)));
            }));
        }));

        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn returns_once_queue_is_empty() {
        let ran = Arc::new(Mutex::new(false));
        let r2 = ran.clone();
        SynchronousEventLoop::run(Box::new(move |_| *r2.lock().unwrap() = true));
        assert!(*ran.lock().unwrap());
    }
}
