use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::Notify;

/// Newest value per key; older unread values for the same key are replaced.
pub struct LatestSlots<T> {
    slots: Mutex<HashMap<String, T>>,
    notify_any: Arc<Notify>,
}

impl<T> LatestSlots<T> {
    pub fn new(notify_any: Arc<Notify>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            notify_any,
        }
    }

    pub fn set(&self, key: &str, value: T) {
        self.slots
            .lock()
            .expect("LatestSlots poisoned")
            .insert(key.to_string(), value);
        self.notify_any.notify_one();
    }

    pub fn take_all(&self) -> Vec<T> {
        self.slots
            .lock()
            .expect("LatestSlots poisoned")
            .drain()
            .map(|(_, v)| v)
            .collect()
    }
}

/// Bounded FIFO; pushing into a full queue evicts the oldest entry.
pub struct DropOldestFifo<T> {
    buf: Mutex<VecDeque<T>>,
    capacity: usize,
    dropped_total: AtomicU64,
    notify_any: Arc<Notify>,
}

impl<T> DropOldestFifo<T> {
    pub fn new(capacity: usize, notify_any: Arc<Notify>) -> Self {
        assert!(capacity > 0);

        Self {
            buf: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped_total: AtomicU64::new(0),
            notify_any,
        }
    }

    /// Push `value`, returning the entry evicted to make room.
    pub fn push_overwrite(&self, value: T) -> Option<T> {
        let mut buf = self.buf.lock().expect("DropOldestFifo poisoned");
        let evicted = if buf.len() >= self.capacity {
            buf.pop_front()
        } else {
            None
        };
        if evicted.is_some() {
            self.dropped_total.fetch_add(1, Ordering::Relaxed);
        }
        buf.push_back(value);
        drop(buf);
        self.notify_any.notify_one();
        evicted
    }

    pub fn try_recv(&self) -> Option<T> {
        self.buf.lock().expect("DropOldestFifo poisoned").pop_front()
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }
}
