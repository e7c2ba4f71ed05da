//! Batched job queue.
//!
//! # Algorithm
//!
//! 1. `queue_job` inserts into a pending set keyed by job identity.
//! 2. The first insertion since the last flush queues a microtask flush.
//! 3. The flush takes the whole pending set, resets the scheduling flag and
//!    runs each job once, in insertion order.
//! 4. A job queued while a flush is running lands in a fresh pending set and
//!    waits for the next flush, so a flush never re-enters itself.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use super::microtask::queue_microtask;
use crate::reactive::{Effect, EffectId};

/// Identity used for de-duplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKey {
    /// A free-standing job created with [`Job::new`].
    Job(u64),
    /// The re-run of an effect. The same effect always maps to the same key.
    Effect(EffectId),
}

#[derive(Clone)]
enum JobTask {
    Closure(Arc<dyn Fn() + Send + Sync>),
    Effect(Effect),
}

/// A unit of queued work.
///
/// Clones share identity: queuing a clone of a pending job is a no-op.
#[derive(Clone)]
pub struct Job {
    key: JobKey,
    task: JobTask,
}

impl Job {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self {
            key: JobKey::Job(COUNTER.fetch_add(1, Ordering::Relaxed)),
            task: JobTask::Closure(Arc::new(run)),
        }
    }

    pub fn key(&self) -> JobKey {
        self.key
    }

    pub fn run(&self) {
        match &self.task {
            JobTask::Closure(f) => f(),
            JobTask::Effect(effect) => effect.run(),
        }
    }
}

impl From<&Effect> for Job {
    fn from(effect: &Effect) -> Self {
        Self {
            key: JobKey::Effect(effect.id()),
            task: JobTask::Effect(effect.clone()),
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("key", &self.key).finish()
    }
}

#[derive(Default)]
struct JobQueue {
    pending: IndexMap<JobKey, Job>,
    flush_scheduled: bool,
}

thread_local! {
    static QUEUE: RefCell<JobQueue> = RefCell::new(JobQueue::default());
}

/// Queue a job for the next flush. Returns false if it was already pending.
pub fn queue_job(job: Job) -> bool {
    let (inserted, schedule) = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if queue.pending.contains_key(&job.key) {
            return (false, false);
        }
        queue.pending.insert(job.key, job);
        let schedule = !queue.flush_scheduled;
        queue.flush_scheduled = true;
        (true, schedule)
    });

    if schedule {
        queue_microtask(flush_jobs);
    }
    inserted
}

/// Run every pending job once.
///
/// Normally invoked as a microtask; calling it directly flushes early.
pub fn flush_jobs() {
    let batch = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        queue.flush_scheduled = false;
        std::mem::take(&mut queue.pending)
    });

    if batch.is_empty() {
        return;
    }
    tracing::debug!(jobs = batch.len(), "flushing job queue");

    for job in batch.into_values() {
        job.run();
    }
}

/// Number of jobs waiting for the next flush.
pub fn pending_job_count() -> usize {
    QUEUE.with(|queue| queue.borrow().pending.len())
}
