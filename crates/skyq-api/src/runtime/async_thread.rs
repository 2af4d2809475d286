//! `AsyncThread` - a dedicated OS thread that owns a tokio runtime.

use std::future::Future;
use std::sync::{Mutex, PoisonError, mpsc};
use std::thread::{self, ThreadId};

use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// Name of the background thread.
pub const THREAD_NAME: &str = "skyq-async";

#[derive(Debug)]
struct Running {
    shutdown: oneshot::Sender<()>,
    thread: thread::JoinHandle<()>,
}

/// Background thread running a current-thread tokio runtime.
///
/// Futures handed to [`spawn`](Self::spawn) or [`block_on`](Self::block_on)
/// run on that thread, so synchronous callers never need a runtime of their
/// own. The thread stops on [`shutdown`](Self::shutdown) or drop.
#[derive(Debug)]
pub struct AsyncThread {
    handle: Handle,
    thread_id: ThreadId,
    running: Mutex<Option<Running>>,
}

impl AsyncThread {
    /// Starts the thread and its runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] if the runtime or the thread cannot be
    /// created.
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Runtime(format!("failed to build tokio runtime: {e}")))?;
        let handle = runtime.handle().clone();
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name(String::from(THREAD_NAME))
            .spawn(move || {
                tracing::debug!("Async thread running");
                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
                drop(runtime);
                tracing::debug!("Async thread finished");
            })
            .map_err(|e| Error::Runtime(format!("failed to spawn {THREAD_NAME} thread: {e}")))?;

        Ok(Self {
            handle,
            thread_id: thread.thread().id(),
            running: Mutex::new(Some(Running { shutdown, thread })),
        })
    }

    /// Handle to the background runtime.
    #[must_use]
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }

    /// `true` until [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Spawns `future` on the background runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] if the thread has been shut down.
    pub fn spawn<F>(&self, future: F) -> Result<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if !self.is_running() {
            return Err(Error::Runtime(String::from("async thread is shut down")));
        }
        Ok(self.handle.spawn(future))
    }

    /// Runs `future` on the background runtime and waits for its output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] if called from inside an async runtime
    /// (including the background thread itself), if the thread has been shut
    /// down, or if the task is cancelled or panics.
    pub fn block_on<F>(&self, future: F) -> Result<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if thread::current().id() == self.thread_id || Handle::try_current().is_ok() {
            return Err(Error::Runtime(String::from(
                "blocking call made from inside an async runtime",
            )));
        }

        let (tx, rx) = mpsc::sync_channel(1);
        self.spawn(async move {
            let _ = tx.send(future.await);
        })?;

        rx.recv()
            .map_err(|_| Error::Runtime(String::from("background task did not complete")))
    }

    /// Stops the runtime and joins the thread. Safe to call more than once.
    pub fn shutdown(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return;
        };

        if running.shutdown.send(()).is_err() {
            tracing::trace!("Async runtime already stopped");
        }
        if thread::current().id() == self.thread_id {
            tracing::warn!("Async thread shut down from itself; not joining");
            return;
        }
        if running.thread.join().is_err() {
            tracing::warn!("Async thread panicked");
        }
        tracing::debug!("Async thread joined");
    }
}

impl Drop for AsyncThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
