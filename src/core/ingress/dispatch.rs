//! Fire-and-forget workflow dispatch
//!
//! Workflows are spawned onto a tokio `JoinSet` so independent arrivals
//! overlap. A failing workflow is logged and counted here and never reaches
//! the spawner.

use crate::domain::Result;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::{JoinError, JoinSet};

#[derive(Debug, Default)]
pub struct WorkflowDispatcher {
    tasks: Mutex<JoinSet<()>>,
    spawned: AtomicUsize,
    failures: Arc<AtomicUsize>,
}

impl WorkflowDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawns `workflow` without waiting for it
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, label: impl Into<String>, workflow: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let label = label.into();
        self.spawned.fetch_add(1, Ordering::SeqCst);
        let failures = Arc::clone(&self.failures);
        let mut tasks = self.tasks();
        // reap finished workflows
        while let Some(joined) = tasks.try_join_next() {
            self.record_join(joined);
        }
        tasks.spawn(async move {
            match workflow.await {
                Ok(()) => tracing::debug!(workflow = %label, "Workflow finished"),
                Err(e) => {
                    failures.fetch_add(1, Ordering::SeqCst);
                    tracing::error!(workflow = %label, error = %e, "Workflow failed");
                }
            }
        });
    }

    /// Waits for every spawned workflow, including ones spawned while waiting
    pub async fn wait_all(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.tasks());
            if tasks.is_empty() {
                break;
            }
            while let Some(joined) = tasks.join_next().await {
                self.record_join(joined);
            }
        }
    }

    fn record_join(&self, joined: std::result::Result<(), JoinError>) {
        if let Err(e) = joined {
            self.failures.fetch_add(1, Ordering::SeqCst);
            tracing::error!(error = %e, "Workflow task panicked or was cancelled");
        }
    }

    /// Workflows spawned and not yet reaped
    pub fn in_flight(&self) -> usize {
        self.tasks().len()
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}
