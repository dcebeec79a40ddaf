//! The serial execution context.
//!
//! A dedicated worker thread owns the connection state. Every public store
//! operation is boxed, sent to the worker over a channel, and executed to
//! completion before the next one is admitted; the submitting caller
//! blocks on a reply channel, so operations are synchronous and totally
//! ordered by admission.
//!
//! Submitting an operation *from* the worker thread (i.e. from inside an
//! already-running operation) would block on a queue that can never make
//! progress. The queue records the worker's `ThreadId` at spawn and fails
//! such submissions fast with [`StoreError::Reentrant`].

use crate::error::{Result, StoreError};
use crate::store::StoreState;
use std::sync::mpsc;
use std::thread::{self, JoinHandle, ThreadId};

type Job = Box<dyn FnOnce(&mut StoreState) + Send>;

pub(crate) struct SerialQueue {
    sender: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    worker_thread: ThreadId,
}

impl SerialQueue {
    /// Start the worker thread that owns `state`.
    pub(crate) fn spawn(state: StoreState) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name("workstore".to_string())
            .spawn(move || worker_loop(state, &receiver))?;
        let worker_thread = worker.thread().id();
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            worker_thread,
        })
    }

    /// Run `op` on the worker and block until it completes.
    pub(crate) fn run<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&mut StoreState) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        if thread::current().id() == self.worker_thread {
            return Err(StoreError::Reentrant);
        }
        let (reply, result) = mpsc::channel();
        let job: Job = Box::new(move |state| {
            // The caller may have given up (queue dropped mid-call);
            // nothing to do with the result then.
            let _ = reply.send(op(state));
        });
        self.sender
            .as_ref()
            .ok_or(StoreError::QueueClosed)?
            .send(job)
            .map_err(|_| StoreError::QueueClosed)?;
        result.recv().map_err(|_| StoreError::QueueClosed)?
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            // A handle clone captured by a job can be dropped on the
            // worker itself; joining from there would never return.
            if thread::current().id() == self.worker_thread {
                return;
            }
            if worker.join().is_err() {
                tracing::warn!("store worker panicked during shutdown");
            }
        }
    }
}

fn worker_loop(mut state: StoreState, receiver: &mpsc::Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        job(&mut state);
    }
    // Channel disconnected: last handle gone. Dropping the state closes
    // any live connection.
    tracing::debug!("store worker shutting down");
}
