//! N-party barrier: every participant calls [`StarterPistol::ready`]; all
//! unblock together once the last one calls it.

use std::sync::{Condvar, Mutex};

pub struct StarterPistol {
    remaining: Mutex<usize>,
    fired: Condvar,
}

impl StarterPistol {
    /// Constructs a barrier expecting `racers` calls to [`ready`](Self::ready).
    pub fn new(racers: usize) -> Self {
        Self {
            remaining: Mutex::new(racers),
            fired: Condvar::new(),
        }
    }

    /// Blocks until `racers` total calls to `ready` (across all participants)
    /// have been made, then returns in every caller.
    pub fn ready(&self) {
        let mut remaining = self.remaining.lock().unwrap();
        *remaining -= 1;
        if *remaining == 0 {
            self.fired.notify_all();
        } else {
            remaining = self.fired.wait_while(remaining, |r| *r != 0).unwrap();
        }
        drop(remaining);
    }
}
