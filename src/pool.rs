//! Bounded worker pool draining a bounded job queue.
//!
//! All non-critical-path work — far writes, publishes, peer-applies — is
//! offloaded here so user-visible Get/Set latency is bounded by near-tier
//! access plus at most one far read and one origin load. Jobs are futures
//! rather than plain closures so async adapter calls run to completion on
//! the pool itself, under its concurrency limit, instead of escaping onto
//! freestanding tasks the pool can no longer bound or drain on release.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// A unit of background work submitted to the pool.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Bounded set of workers draining a bounded FIFO job queue.
pub struct Pool {
    sender: mpsc::Sender<Job>,
    stopped: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    release_once: tokio::sync::Mutex<bool>,
}

impl Pool {
    /// Spawns `workers` tasks draining a queue of capacity `queue_len`.
    pub fn new(workers: usize, queue_len: usize) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel::<Job>(queue_len.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let stopped = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let receiver = receiver.clone();
            let stopped = stopped.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(id, receiver, stopped).await;
            }));
        }

        Arc::new(Self {
            sender,
            stopped,
            workers: Mutex::new(handles),
            release_once: tokio::sync::Mutex::new(false),
        })
    }

    /// Submits a future, blocking if the queue is full and the pool is
    /// running. Returns silently (dropping the job) if the pool is stopped.
    pub async fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        let _ = self.sender.send(Box::pin(job)).await;
    }

    /// Submits a future, returning `false` if it was not accepted within `d`.
    pub async fn submit_with_timeout<F>(&self, job: F, d: Duration) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.stopped.load(Ordering::Acquire) {
            return false;
        }
        tokio::time::timeout(d, self.sender.send(Box::pin(job)))
            .await
            .is_ok()
    }

    /// Submits a future, returning `false` if it was not accepted by `deadline`.
    pub async fn submit_with_deadline<F>(&self, job: F, deadline: tokio::time::Instant) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let now = tokio::time::Instant::now();
        let timeout = deadline.saturating_duration_since(now);
        self.submit_with_timeout(job, timeout).await
    }

    /// Idempotent. Transitions the pool to stopped, lets workers drain any
    /// jobs already queued, and forcibly returns after a 5-second grace
    /// period even if workers have not finished.
    pub async fn release(&self) {
        let mut done = self.release_once.lock().await;
        if *done {
            return;
        }
        *done = true;
        drop(done);

        self.stopped.store(true, Ordering::Release);
        let mut handles = self.workers.lock().await;
        let joins = handles.drain(..).map(|h| async move { let _ = h.await; });
        let all = futures::future::join_all(joins);
        let _ = tokio::time::timeout(Duration::from_secs(5), all).await;
    }
}

async fn worker_loop(
    _id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    stopped: Arc<AtomicBool>,
) {
    loop {
        let job = {
            let mut rx = receiver.lock().await;
            rx.recv().await
        };
        match job {
            Some(job) => run_job(job).await,
            None => return,
        }
        if stopped.load(Ordering::Acquire) {
            // Drain whatever remains without blocking further, then exit.
            loop {
                let next = {
                    let mut rx = receiver.lock().await;
                    rx.try_recv().ok()
                };
                match next {
                    Some(job) => run_job(job).await,
                    None => return,
                }
            }
        }
    }
}

/// Runs a job with panic isolation: a failing job must not take down the
/// worker, which resumes the next job.
async fn run_job(job: Job) {
    if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(panic = %message, "worker pool job panicked");
    }
}
