//! Keyed cancellable delayed tasks.
//!
//! At most one task is live per key: scheduling a key again aborts the task
//! already waiting under it.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

pub struct DelayedTasks<K> {
    tasks: HashMap<K, JoinHandle<()>>,
}

impl<K> DelayedTasks<K>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Runs `task` after `delay`, replacing any task pending under `key`.
    pub fn schedule<F>(&mut self, key: K, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.retain(|_, handle| !handle.is_finished());

        let handle = tokio::spawn(async move {
            sleep(delay).await;
            task.await;
        });

        if let Some(previous) = self.tasks.insert(key, handle) {
            previous.abort();
        }
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        match self.tasks.remove(key) {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }

    /// Number of tasks still waiting or running.
    pub fn pending(&self) -> usize {
        self.tasks
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}

impl<K: Eq + Hash> Default for DelayedTasks<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for DelayedTasks<K> {
    fn drop(&mut self) {
        for handle in self.tasks.values() {
            handle.abort();
        }
    }
}
