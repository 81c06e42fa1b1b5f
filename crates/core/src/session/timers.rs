use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::task::AbortHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    CompletionPoll,
    Estimator,
    QueueWatch,
    Availability,
    /// Delayed return to idle after a confirmed cancellation
    ViewReset,
}

type TimerKey = (String, TimerKind);

/// Background tasks of the session, at most one per request and kind.
#[derive(Default)]
pub struct TimerRegistry {
    next_token: AtomicU64,
    timers: Mutex<HashMap<TimerKey, (u64, AbortHandle)>>,
    global: Mutex<Vec<AbortHandle>>,
}

impl TimerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Run `task` as the `kind` timer of `request_id`, aborting the one it replaces.
    pub fn spawn<F>(self: &Arc<Self>, request_id: &str, kind: TimerKind, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let key: TimerKey = (request_id.to_string(), kind);
        let registry = Arc::downgrade(self);
        let finished_key = key.clone();

        // Held across the spawn so a task that finishes at once still finds its entry.
        let mut timers = self.timers.lock().expect("TimerRegistry poisoned");
        let handle = tokio::spawn(async move {
            task.await;
            if let Some(registry) = registry.upgrade() {
                registry.finish(&finished_key, token);
            }
        });
        if let Some((_, previous)) = timers.insert(key, (token, handle.abort_handle())) {
            debug!(request_id, ?kind, "replacing timer");
            previous.abort();
        }
    }

    pub fn spawn_global<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.global
            .lock()
            .expect("TimerRegistry poisoned")
            .push(handle.abort_handle());
    }

    fn finish(&self, key: &TimerKey, token: u64) {
        let mut timers = self.timers.lock().expect("TimerRegistry poisoned");
        if timers.get(key).is_some_and(|(t, _)| *t == token) {
            timers.remove(key);
        }
    }

    pub fn stop(&self, request_id: &str, kind: TimerKind) {
        let key: TimerKey = (request_id.to_string(), kind);
        if let Some((_, handle)) = self
            .timers
            .lock()
            .expect("TimerRegistry poisoned")
            .remove(&key)
        {
            handle.abort();
        }
    }

    /// Stop every timer of `request_id` except `keep`, which is usually the caller.
    pub fn stop_others(&self, request_id: &str, keep: TimerKind) {
        let mut timers = self.timers.lock().expect("TimerRegistry poisoned");
        timers.retain(|(id, kind), (_, handle)| {
            if id == request_id && *kind != keep {
                handle.abort();
                false
            } else {
                true
            }
        });
    }

    pub fn stop_all(&self, request_id: &str) {
        let mut timers = self.timers.lock().expect("TimerRegistry poisoned");
        timers.retain(|(id, _), (_, handle)| {
            if id == request_id {
                handle.abort();
                false
            } else {
                true
            }
        });
    }

    pub fn is_active(&self, request_id: &str, kind: TimerKind) -> bool {
        self.timers
            .lock()
            .expect("TimerRegistry poisoned")
            .contains_key(&(request_id.to_string(), kind))
    }

    pub fn ids(&self, kind: TimerKind) -> Vec<String> {
        self.timers
            .lock()
            .expect("TimerRegistry poisoned")
            .keys()
            .filter(|(_, k)| *k == kind)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn abort_all(&self) {
        for (_, (_, handle)) in self.timers.lock().expect("TimerRegistry poisoned").drain() {
            handle.abort();
        }
        for handle in self.global.lock().expect("TimerRegistry poisoned").drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn replacing_aborts_previous() {
        let registry = TimerRegistry::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let first = tx.clone();
        registry.spawn("r1", TimerKind::CompletionPoll, async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            let _ = first.send("first");
        });
        registry.spawn("r1", TimerKind::CompletionPoll, async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            let _ = tx.send("second");
        });

        assert_eq!(rx.recv().await, Some("second"));
        assert_eq!(rx.recv().await, None);
        assert!(!registry.is_active("r1", TimerKind::CompletionPoll));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_others_keeps_the_caller() {
        let registry = TimerRegistry::new();
        for kind in [TimerKind::CompletionPoll, TimerKind::Estimator, TimerKind::QueueWatch] {
            registry.spawn("r1", kind, std::future::pending());
        }
        registry.spawn("r2", TimerKind::Estimator, std::future::pending());

        registry.stop_others("r1", TimerKind::CompletionPoll);
        assert!(registry.is_active("r1", TimerKind::CompletionPoll));
        assert!(!registry.is_active("r1", TimerKind::Estimator));
        assert!(registry.is_active("r2", TimerKind::Estimator));
        assert_eq!(registry.ids(TimerKind::Estimator), vec!["r2".to_string()]);

        registry.abort_all();
        assert!(registry.ids(TimerKind::CompletionPoll).is_empty());
    }
}
