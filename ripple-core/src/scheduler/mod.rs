//! Deferred Execution
//!
//! This module implements the two kinds of deferred (never parallel) work
//! the runtime needs:
//!
//! - **Microtasks**: closures run after the current synchronous call stack
//!   unwinds. Lifecycle callbacks and job-queue flushes are microtasks.
//!
//! - **Jobs**: identity-carrying units queued into a de-duplicating pending
//!   set. Queuing the same job twice before a flush runs it once.
//!
//! # Event Loop Model
//!
//! There is no ambient event loop. Each thread owns its queues, and the
//! embedder (or a test) drives them by calling [`flush_microtasks`] at the
//! point where a browser would run its microtask checkpoint.

mod microtask;
mod queue;

pub use microtask::{flush_microtasks, has_pending_microtasks, queue_microtask};
pub use queue::{flush_jobs, pending_job_count, queue_job, Job, JobKey};
