//! Background worker pool.
//!
//! A small, fixed set of threads draining one FIFO job queue. Jobs are
//! dequeued in submission order; with more than one worker they may finish in
//! any order.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::profiling::profile_scope;

/// Upper bound on the number of worker threads.
pub const MAX_WORKERS: usize = 4;

/// A unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    jobs: VecDeque<Job>,
    stop: bool,
    suspended: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    wake: Condvar,
    /// Queued plus running jobs.
    current_jobs: AtomicUsize,
    /// Jobs taken off the queue and not finished yet. Only changes under the
    /// queue lock when it goes up.
    running_jobs: AtomicUsize,
}

impl Shared {
    fn next_job(&self) -> Option<Job> {
        let mut queue = self.queue.lock();
        loop {
            if !queue.suspended
                && let Some(job) = queue.jobs.pop_front()
            {
                self.running_jobs.fetch_add(1, Ordering::AcqRel);
                return Some(job);
            }
            // Queued jobs are drained before a stop takes effect.
            if queue.stop && (queue.jobs.is_empty() || queue.suspended) {
                return None;
            }
            self.wake.wait(&mut queue);
        }
    }

    fn run(&self) {
        while let Some(job) = self.next_job() {
            {
                profile_scope!("worker_job");
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!(
                        "Job panicked on worker thread {:?}",
                        thread::current().name()
                    );
                }
            }
            let previous = self.current_jobs.fetch_sub(1, Ordering::AcqRel);
            debug_assert!(previous > 0, "job counter underflow");
            self.running_jobs.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// A fixed-size pool of background threads.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use kiln_core::worker::WorkerPool;
///
/// let pool = WorkerPool::new(2);
/// let counter = Arc::new(AtomicUsize::new(0));
/// for _ in 0..8 {
///     let counter = Arc::clone(&counter);
///     pool.enqueue(move || {
///         counter.fetch_add(1, Ordering::Relaxed);
///     });
/// }
/// pool.shutdown();
/// assert_eq!(counter.load(Ordering::Relaxed), 8);
/// ```
pub struct WorkerPool {
    shared: Arc<Shared>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a pool with `num_workers` threads.
    ///
    /// # Panics
    ///
    /// Panics if `num_workers` is 0 or greater than [`MAX_WORKERS`], or if the
    /// OS refuses to spawn a thread.
    pub fn new(num_workers: usize) -> Self {
        assert!(
            (1..=MAX_WORKERS).contains(&num_workers),
            "WorkerPool needs between 1 and {MAX_WORKERS} workers, got {num_workers}"
        );

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                stop: false,
                suspended: false,
            }),
            wake: Condvar::new(),
            current_jobs: AtomicUsize::new(0),
            running_jobs: AtomicUsize::new(0),
        });

        let threads = (0..num_workers)
            .map(|i| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("kiln-worker-{}", i))
                    .spawn(move || shared.run())
                    .expect("Failed to spawn worker thread")
            })
            .collect();

        tracing::debug!("WorkerPool created with {} threads", num_workers);

        Self { shared, threads }
    }

    /// A pool sized to the machine: one worker per spare core, capped at
    /// [`MAX_WORKERS`].
    pub fn default_workers() -> Self {
        Self::new(num_cpus::get().saturating_sub(1).clamp(1, MAX_WORKERS))
    }

    /// Queue `job` for execution. Fire and forget.
    pub fn enqueue(&self, job: impl FnOnce() + Send + 'static) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.stop {
                tracing::warn!("Job enqueued on a stopped WorkerPool was dropped");
                return;
            }
            queue.jobs.push_back(Box::new(job));
            self.shared.current_jobs.fetch_add(1, Ordering::AcqRel);
        }
        self.shared.wake.notify_one();
    }

    /// Jobs queued or running. Diagnostics only; the value may be stale as
    /// soon as it is read.
    pub fn current_job_count(&self) -> usize {
        self.shared.current_jobs.load(Ordering::Acquire)
    }

    /// Jobs a worker has picked up and not finished. A suspended pool with no
    /// running jobs will not finish anything until it is resumed.
    pub fn running_job_count(&self) -> usize {
        self.shared.running_jobs.load(Ordering::Acquire)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Stop handing out queued jobs. Running jobs finish normally.
    pub fn suspend(&self) {
        self.shared.queue.lock().suspended = true;
        tracing::debug!("WorkerPool suspended");
    }

    pub fn resume(&self) {
        self.shared.queue.lock().suspended = false;
        self.shared.wake.notify_all();
        tracing::debug!("WorkerPool resumed");
    }

    pub fn is_suspended(&self) -> bool {
        self.shared.queue.lock().suspended
    }

    /// Finish queued jobs and join every worker.
    ///
    /// A suspended pool drops whatever is still queued.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        tracing::debug!("Shutting down WorkerPool with {} threads", self.threads.len());

        self.shared.queue.lock().stop = true;
        self.shared.wake.notify_all();

        for handle in std::mem::take(&mut self.threads) {
            if let Err(e) = handle.join() {
                tracing::error!("Worker thread panicked: {:?}", e);
            }
        }

        let dropped = {
            let mut queue = self.shared.queue.lock();
            let dropped = queue.jobs.len();
            queue.jobs.clear();
            dropped
        };
        if dropped > 0 {
            self.shared.current_jobs.fetch_sub(dropped, Ordering::AcqRel);
            tracing::debug!("WorkerPool dropped {} queued jobs", dropped);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_pool_creation() {
        let pool = WorkerPool::new(2);
        assert_eq!(pool.thread_count(), 2);
        assert_eq!(pool.current_job_count(), 0);
    }

    #[test]
    #[should_panic(expected = "WorkerPool needs between 1 and 4 workers")]
    fn test_zero_workers_panics() {
        WorkerPool::new(0);
    }

    #[test]
    #[should_panic(expected = "WorkerPool needs between 1 and 4 workers")]
    fn test_too_many_workers_panics() {
        WorkerPool::new(MAX_WORKERS + 1);
    }

    #[test]
    fn test_single_worker_runs_fifo() {
        let pool = WorkerPool::new(1);
        let (tx, rx) = mpsc::channel();
        for i in 0..10 {
            let tx = tx.clone();
            pool.enqueue(move || tx.send(i).unwrap());
        }
        pool.shutdown();

        let order: Vec<_> = rx.try_iter().collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_job_count_drops_to_zero() {
        let pool = WorkerPool::new(2);
        let (tx, rx) = mpsc::channel();
        for _ in 0..4 {
            let tx = tx.clone();
            pool.enqueue(move || tx.send(()).unwrap());
        }
        for _ in 0..4 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        // The counter is decremented just after the job returns.
        while pool.current_job_count() != 0 {
            thread::yield_now();
        }
    }

    #[test]
    fn test_panicking_job_keeps_worker_alive() {
        let pool = WorkerPool::new(1);
        let (tx, rx) = mpsc::channel();
        pool.enqueue(|| panic!("boom"));
        pool.enqueue(move || tx.send(42).unwrap());
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }

    #[test]
    fn test_suspend_holds_jobs() {
        let pool = WorkerPool::new(1);
        pool.suspend();
        assert!(pool.is_suspended());

        let (tx, rx) = mpsc::channel();
        pool.enqueue(move || tx.send(()).unwrap());
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(pool.current_job_count(), 1);

        pool.resume();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_running_count_excludes_suspended_queue() {
        let pool = WorkerPool::new(1);
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        pool.enqueue(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
        });
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        pool.suspend();
        pool.enqueue(|| {});
        assert_eq!(pool.running_job_count(), 1);
        assert_eq!(pool.current_job_count(), 2);

        release_tx.send(()).unwrap();
        while pool.running_job_count() != 0 {
            thread::yield_now();
        }
        assert_eq!(pool.current_job_count(), 1);
        pool.resume();
    }
}
