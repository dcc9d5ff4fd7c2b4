//! Single-worker task executor with a bounded submission queue.
//!
//! Each pump and each mixer owns one executor; everything submitted to it
//! runs strictly serialized on one worker thread. Submission through
//! [`begin_invoke`](Executor::begin_invoke) is non-blocking until the
//! bound is reached, then blocks the caller — the mixer's capacity-2
//! executor turns this into the primary backpressure toward upstream
//! producers. [`invoke`](Executor::invoke) additionally blocks until the
//! task has completed.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// One-shot result of a task submitted with `begin_invoke`.
///
/// The handle resolves when the task completes. It is abandoned (resolves
/// to `None`) when the executor stops before the task runs or the task
/// panics.
pub struct TaskHandle<T> {
    rx: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task completes. `None` if the task was abandoned.
    pub fn wait(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Returns the result if the task has already completed.
    pub fn try_take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

/// A single worker thread draining a FIFO of submitted closures.
pub struct Executor {
    name: String,
    tx: Sender<Task>,
    rx: Receiver<Task>,
    capacity: Option<usize>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Executor {
    /// An executor whose submission queue never blocks senders.
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self::start(name.into(), tx, rx, None)
    }

    /// An executor that blocks senders once `capacity` tasks are
    /// outstanding (running or pending).
    pub fn bounded(name: impl Into<String>, capacity: usize) -> Self {
        // The worker frees its queue slot the moment it dequeues a task,
        // so the running task occupies an implicit slot and the channel
        // holds one less than the outstanding bound.
        let (tx, rx) = crossbeam_channel::bounded(capacity.saturating_sub(1));
        Self::start(name.into(), tx, rx, Some(capacity))
    }

    fn start(
        name: String,
        tx: Sender<Task>,
        rx: Receiver<Task>,
        capacity: Option<usize>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let worker_rx = rx.clone();
        let worker_running = Arc::clone(&running);
        let worker_name = name.clone();
        let handle = std::thread::spawn(move || {
            while worker_running.load(Ordering::Acquire) {
                match worker_rx.recv_timeout(Duration::from_millis(50)) {
                    Ok(task) => {
                        if catch_unwind(AssertUnwindSafe(task)).is_err() {
                            tracing::error!(executor = %worker_name, "task panicked");
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!(executor = %worker_name, "worker exited");
        });
        Self {
            name,
            tx,
            rx,
            capacity,
            running,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Submits `f` and returns a handle to its result. Blocks only when a
    /// bounded queue is full. After [`stop`](Self::stop) the task is
    /// dropped and the handle is abandoned.
    pub fn begin_invoke<T, F>(&self, f: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let handle = TaskHandle { rx: result_rx };
        if !self.is_running() {
            tracing::warn!(executor = %self.name, "submission after stop dropped");
            return handle;
        }
        let task: Task = Box::new(move || {
            let _ = result_tx.send(f());
        });
        if self.tx.send(task).is_err() {
            tracing::warn!(executor = %self.name, "submission queue closed");
        }
        handle
    }

    /// Submits `f` and blocks until it has run, returning its result.
    /// `None` if the executor stopped first.
    pub fn invoke<T, F>(&self, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.begin_invoke(f).wait()
    }

    /// Number of tasks pending in the submission queue.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Submission bound, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Drops every pending task. Their handles are abandoned.
    pub fn clear(&self) {
        let mut dropped = 0usize;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(executor = %self.name, dropped, "cleared pending tasks");
        }
    }

    /// Stops accepting work and lets the worker wind down. The currently
    /// running task, if any, completes.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.clear();
        self.stop();
        if let Some(handle) = self.worker.lock().take() {
            // A task may own the last reference to its executor; joining
            // from the worker thread itself would deadlock.
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
