//! Microtask queue.
//!
//! A FIFO of closures, drained to empty by [`flush_microtasks`]. Microtasks
//! queued while draining run in the same drain, after everything queued
//! before them.

use std::cell::RefCell;
use std::collections::VecDeque;

type Microtask = Box<dyn FnOnce()>;

thread_local! {
    static MICROTASKS: RefCell<VecDeque<Microtask>> = RefCell::new(VecDeque::new());
}

/// Schedule `task` to run after the current synchronous work.
pub fn queue_microtask<F>(task: F)
where
    F: FnOnce() + 'static,
{
    MICROTASKS.with(|queue| queue.borrow_mut().push_back(Box::new(task)));
}

/// Run microtasks until the queue is empty. Returns how many ran.
pub fn flush_microtasks() -> usize {
    let mut ran = 0;
    loop {
        // Pop outside the borrow: the task may queue more microtasks.
        let next = MICROTASKS.with(|queue| queue.borrow_mut().pop_front());
        match next {
            Some(task) => {
                task();
                ran += 1;
            }
            None => break,
        }
    }
    if ran > 0 {
        tracing::trace!(ran, "microtasks flushed");
    }
    ran
}

pub fn has_pending_microtasks() -> bool {
    MICROTASKS.with(|queue| !queue.borrow().is_empty())
}
