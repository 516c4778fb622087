//! Single-threaded serial executor.
//!
//! A [`Worker`] owns a piece of state on a dedicated thread and applies
//! submitted closures to it one at a time, in submission order. This is the
//! same shape as the background thread behind `tokio_rusqlite::Connection`,
//! for state that is not a database connection.

use std::fmt;
use std::sync::mpsc;
use std::thread;

use tokio::sync::oneshot;

use crate::Error;

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Handle to a worker thread owning `S`.
///
/// Handles are cheap to clone; all clones feed the same queue. The thread
/// exits once every handle has been dropped and the queue is drained.
pub struct Worker<S> {
    sender: mpsc::Sender<Job<S>>,
}

impl<S: Send + 'static> Worker<S> {
    /// Move `state` onto a new thread called `name`.
    pub fn spawn(name: impl Into<String>, mut state: S) -> Result<Self, Error> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Job<S>>();

        thread::Builder::new().name(name.clone()).spawn(move || {
            while let Ok(job) = receiver.recv() {
                job(&mut state);
            }
            tracing::trace!(worker = %name, "worker queue closed");
        })?;

        Ok(Self { sender })
    }

    /// Run `function` against the state once every earlier call has finished.
    ///
    /// Returns [`Error::WorkerClosed`] if the thread has exited, including
    /// when `function` itself panics.
    pub async fn call<F, R>(&self, function: F) -> Result<R, Error>
    where
        F: FnOnce(&mut S) -> Result<R, Error> + Send + 'static,
        R: Send + 'static,
    {
        let (reply, response) = oneshot::channel();

        self.sender
            .send(Box::new(move |state: &mut S| {
                // The caller may have stopped waiting.
                let _ = reply.send(function(state));
            }))
            .map_err(|_| Error::WorkerClosed)?;

        response.await.map_err(|_| Error::WorkerClosed)?
    }
}

impl<S> Clone for Worker<S> {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone() }
    }
}

impl<S> fmt::Debug for Worker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").finish_non_exhaustive()
    }
}
