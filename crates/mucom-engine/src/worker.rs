//! Bounded thread pool running method callbacks off the ingest path.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, error, warn};

use crate::error::{EngineError, Result};
use crate::registry::Method;

struct Job {
    id: u8,
    method: Method,
    payload: Bytes,
}

/// Fixed set of worker threads fed by a bounded queue.
///
/// Submission never blocks: when every worker is busy and the queue is full
/// the job is dropped with a warning. A failing or panicking callback is
/// logged and the worker carries on with the next job.
pub(crate) struct WorkerPool {
    tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub(crate) fn new(threads: usize, queue_depth: usize) -> Result<Self> {
        let (tx, rx) = bounded::<Job>(queue_depth);

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("mucom-worker-{index}"))
                .spawn(move || run_worker(rx))
                .map_err(|err| {
                    EngineError::Configuration(format!("failed to spawn worker thread: {err}"))
                })?;
            workers.push(handle);
        }

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    /// Queue `method(payload)`. Returns false if the job was dropped.
    pub(crate) fn submit(&self, id: u8, method: Method, payload: Bytes) -> bool {
        let guard = lock(&self.tx);
        let Some(tx) = guard.as_ref() else {
            debug!(id, "worker pool stopped, dropping execute request");
            return false;
        };
        match tx.try_send(Job {
            id,
            method,
            payload,
        }) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                warn!(id = job.id, "worker queue full, dropping execute request");
                false
            }
            Err(TrySendError::Disconnected(job)) => {
                debug!(id = job.id, "worker pool stopped, dropping execute request");
                false
            }
        }
    }

    /// Stop accepting jobs, let queued ones finish and join the workers.
    pub(crate) fn shutdown(&self) {
        lock(&self.tx).take();
        let workers = std::mem::take(&mut *lock(&self.workers));
        let current = thread::current().id();
        for worker in workers {
            // A callback may drop the last engine handle from inside a worker.
            if worker.thread().id() != current {
                let _ = worker.join();
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(rx: Receiver<Job>) {
    for Job {
        id,
        method,
        payload,
    } in rx.iter()
    {
        match panic::catch_unwind(AssertUnwindSafe(|| method(&payload))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(id, error = %err, "method callback failed"),
            Err(cause) => error!(id, panic = panic_message(&*cause), "method callback panicked"),
        }
    }
}

pub(crate) fn panic_message(cause: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = cause.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = cause.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
