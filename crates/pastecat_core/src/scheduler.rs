//! Delayed deletion of expired pastes.
//!
//! One background thread sleeps until the earliest due job, runs every job
//! that is due, and goes back to sleep. Failed deletions are re-queued with a
//! fixed backoff until the retry budget runs out.

use crate::constants::{DELETE_RETRIES, DELETE_RETRY_BACKOFF};
use crate::error::AppError;
use crate::id::PasteId;
use crate::store::Store;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often and how patiently a failed deletion is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: u32,
    /// Delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DELETE_RETRIES,
            backoff: DELETE_RETRY_BACKOFF,
        }
    }
}

struct Job {
    due: Instant,
    seq: u64,
    id: PasteId,
    attempt: u32,
    store: Weak<dyn Store>,
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

#[derive(Default)]
struct Queue {
    jobs: BinaryHeap<Reverse<Job>>,
    running: usize,
    seq: u64,
    shutdown: bool,
}

impl Queue {
    fn push(&mut self, job: Job) {
        self.seq += 1;
        self.jobs.push(Reverse(Job {
            seq: self.seq,
            ..job
        }));
    }
}

struct Shared {
    queue: Mutex<Queue>,
    wake: Condvar,
    policy: RetryPolicy,
}

/// Timer service that deletes pastes once their lifetime ends.
pub struct DeletionScheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl DeletionScheduler {
    /// Start the timer thread.
    ///
    /// # Errors
    /// Returns an I/O error if the thread cannot be spawned.
    pub fn start(policy: RetryPolicy) -> Result<Self, AppError> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            wake: Condvar::new(),
            policy,
        });
        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("paste-expiry".to_string())
                .spawn(move || run(&shared))?
        };
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Delete `id` from `store` once `after` has elapsed.
    ///
    /// A zero delay means the paste never expires and schedules nothing.
    pub fn schedule(&self, store: Weak<dyn Store>, id: PasteId, after: Duration) {
        if after.is_zero() {
            return;
        }
        let Some(due) = Instant::now().checked_add(after) else {
            tracing::warn!("Not scheduling expiry of {}: {:?} is out of range", id, after);
            return;
        };
        let mut queue = self.shared.queue.lock();
        queue.push(Job {
            due,
            seq: 0,
            id,
            attempt: 0,
            store,
        });
        self.shared.wake.notify_one();
    }

    /// Jobs still waiting to run, including one currently running.
    pub fn pending(&self) -> usize {
        let queue = self.shared.queue.lock();
        queue.jobs.len() + queue.running
    }
}

impl Drop for DeletionScheduler {
    fn drop(&mut self) {
        self.shared.queue.lock().shutdown = true;
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Paste expiry thread panicked");
            }
        }
    }
}

fn run(shared: &Shared) {
    let mut queue = shared.queue.lock();
    loop {
        if queue.shutdown {
            return;
        }
        let due = match queue.jobs.peek() {
            Some(Reverse(job)) => job.due,
            None => {
                shared.wake.wait(&mut queue);
                continue;
            }
        };
        if due > Instant::now() {
            shared.wake.wait_until(&mut queue, due);
            continue;
        }
        let Some(Reverse(job)) = queue.jobs.pop() else {
            continue;
        };
        queue.running += 1;
        let retry = MutexGuard::unlocked(&mut queue, || attempt(job, shared.policy));
        queue.running -= 1;
        if let Some(job) = retry {
            queue.push(job);
        }
    }
}

/// Run one deletion attempt, returning the job to re-queue on failure.
fn attempt(job: Job, policy: RetryPolicy) -> Option<Job> {
    let Some(store) = job.store.upgrade() else {
        tracing::debug!("Dropping expiry of {}: store is gone", job.id);
        return None;
    };
    match store.delete(&job.id) {
        Ok(()) => {
            tracing::debug!("Deleted expired paste {}", job.id);
            None
        }
        // A concurrent delete that has closed the gate also reports NotFound,
        // and it may still fail and reopen the paste.
        Err(AppError::NotFound) if !store.contains(&job.id) => {
            tracing::debug!("Expired paste {} was already removed", job.id);
            None
        }
        Err(err) if job.attempt < policy.retries => {
            tracing::warn!(
                "Could not delete {}, trying again in {:?}: {}",
                job.id,
                policy.backoff,
                err
            );
            Some(Job {
                due: Instant::now().checked_add(policy.backoff)?,
                attempt: job.attempt + 1,
                ..job
            })
        }
        Err(err) => {
            tracing::error!(
                "Giving up on deleting {} after {} attempts: {}",
                job.id,
                job.attempt + 1,
                err
            );
            None
        }
    }
}
