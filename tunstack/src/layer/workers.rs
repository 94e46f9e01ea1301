use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

use super::Result;

/// The long running tasks of one pipeline stage.
#[derive(Debug, Default)]
pub(crate) struct Workers {
    started: AtomicBool,
    handles: Mutex<Vec<JoinHandle<Result<()>>>>,
}

impl Workers {
    /// Mark the stage as started, returns `false` if it already was.
    pub(crate) fn start(&self) -> bool {
        !self.started.swap(true, Ordering::AcqRel)
    }

    /// Spawn a task onto the current tokio runtime.
    ///
    /// # Panics
    /// This function panics when called outside of a tokio runtime.
    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// Wait for all tasks spawned so far and report the first failure.
    pub(crate) async fn join(&self) -> Result<()> {
        let handles = std::mem::take(&mut *self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner));

        let mut first = Ok(());
        for handle in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => Err(err.into()),
            };
            if first.is_ok() {
                first = result;
            }
        }
        first
    }
}
