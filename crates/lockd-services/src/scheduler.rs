//! Deferred per-device tasks, keyed by address and purpose.
//!
//! Each scheduled task sleeps on its own timer, so a slow or unresponsive
//! device never delays another device's checks. Tasks remove themselves
//! from the table when they finish; `cancel` aborts whatever is pending.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::AbortHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Demote the device if no pong refreshed it within the window.
    LivenessCheck,
    /// Log whether a removed address came back.
    RemovalGuard,
}

type TaskKey = (String, TaskKind);

#[derive(Clone, Default)]
pub struct TaskScheduler {
    next_id: Arc<AtomicU64>,
    tasks: Arc<DashMap<TaskKey, HashMap<u64, AbortHandle>>>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`. Must be called from within a Tokio runtime.
    pub fn schedule<F>(&self, address: &str, kind: TaskKind, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key: TaskKey = (address.to_string(), kind);

        // Hold the entry while spawning so the task cannot finish and
        // clean up before its abort handle is recorded.
        let mut slot = self.tasks.entry(key.clone()).or_default();
        let tasks = self.tasks.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
            finish(&tasks, &key, id);
        });
        slot.insert(id, handle.abort_handle());
    }

    /// Abort every pending task of `kind` for `address`. Returns how many were pending.
    pub fn cancel(&self, address: &str, kind: TaskKind) -> usize {
        match self.tasks.remove(&(address.to_string(), kind)) {
            Some((_, pending)) => {
                for handle in pending.values() {
                    handle.abort();
                }
                pending.len()
            }
            None => 0,
        }
    }

    pub fn pending(&self, address: &str, kind: TaskKind) -> usize {
        self.tasks
            .get(&(address.to_string(), kind))
            .map(|p| p.len())
            .unwrap_or(0)
    }

    pub fn total_pending(&self) -> usize {
        self.tasks.iter().map(|p| p.len()).sum()
    }
}

fn finish(tasks: &DashMap<TaskKey, HashMap<u64, AbortHandle>>, key: &TaskKey, id: u64) {
    if let Some(mut pending) = tasks.get_mut(key) {
        pending.remove(&id);
    }
    tasks.remove_if(key, |_, pending| pending.is_empty());
}
