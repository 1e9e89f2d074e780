//! Job Scheduler
//!
//! The scheduler batches re-runs that are allowed to happen later.
//!
//! # Algorithm
//!
//! 1. A scheduler override calls [`queue_job`] instead of running its effect.
//!    Jobs are deduplicated by identity, so an effect queued three times
//!    before the flush runs once.
//! 2. The first job queued while no flush is pending defers a flush to the
//!    end of the current synchronous phase.
//! 3. The host ends the phase by calling [`tick`], which drains the deferred
//!    task queue. The flush runs every queued job in first-queued order; jobs
//!    queued while flushing join the same flush.
//!
//! Nothing runs on its own: without a call to [`tick`] queued jobs wait.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use indexmap::IndexMap;

/// A unit of deferred work. Identity is the pointer of the `Rc`.
pub type Job = Rc<dyn Fn()>;

struct JobQueue {
    jobs: IndexMap<usize, Job>,
    flush_pending: bool,
}

thread_local! {
    static QUEUE: RefCell<JobQueue> = RefCell::new(JobQueue {
        jobs: IndexMap::new(),
        flush_pending: false,
    });
    static MICROTASKS: RefCell<VecDeque<Box<dyn FnOnce()>>> = const { RefCell::new(VecDeque::new()) };
}

fn job_key(job: &Job) -> usize {
    Rc::as_ptr(job) as *const () as usize
}

/// Add `job` to the batching queue.
///
/// Queueing a job that is already waiting is a no-op.
pub fn queue_job(job: Job) {
    let schedule = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        queue.jobs.entry(job_key(&job)).or_insert(job);
        !std::mem::replace(&mut queue.flush_pending, true)
    });

    if schedule {
        queue_microtask(flush_jobs);
    }
}

/// Run every queued job once, including jobs queued during the flush.
///
/// Normally called from the deferred task scheduled by [`queue_job`].
pub fn flush_jobs() {
    let mut ran = 0usize;
    loop {
        let next = QUEUE.with(|queue| queue.borrow_mut().jobs.shift_remove_index(0));
        let Some((_, job)) = next else {
            break;
        };
        job();
        ran += 1;
    }

    QUEUE.with(|queue| queue.borrow_mut().flush_pending = false);
    tracing::debug!(jobs = ran, "flushed job queue");
}

/// Defer `task` to the end of the current synchronous phase.
pub fn queue_microtask(task: impl FnOnce() + 'static) {
    MICROTASKS.with(|tasks| tasks.borrow_mut().push_back(Box::new(task)));
}

/// End the synchronous phase: run deferred tasks until none are left.
///
/// Tasks deferred while draining run in the same call. Returns the number of
/// tasks run.
pub fn tick() -> usize {
    let mut ran = 0;
    loop {
        let next = MICROTASKS.with(|tasks| tasks.borrow_mut().pop_front());
        let Some(task) = next else {
            return ran;
        };
        task();
        ran += 1;
    }
}

/// Number of jobs waiting for the next flush.
pub fn pending_jobs() -> usize {
    QUEUE.with(|queue| queue.borrow().jobs.len())
}
