use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{trace, warn};

use crate::events::{DropOldestFifo, Envelope, LatestSlots, SessionEvent};

const DEFAULT_CAPACITY: usize = 64;

/// Session side of the view channel. Progress updates coalesce per request;
/// every other event is delivered in order from a bounded FIFO.
#[derive(Clone)]
pub struct ViewSender {
    progress: Arc<LatestSlots<Envelope>>,
    events: Arc<DropOldestFifo<Envelope>>,
}

pub struct ViewReceiver {
    progress: Arc<LatestSlots<Envelope>>,
    events: Arc<DropOldestFifo<Envelope>>,
    notify_any: Arc<Notify>,
}

pub enum ViewBatch {
    /// Newest progress per request, oldest request first
    Snapshots(Vec<Envelope>),
    Event(Envelope),
}

pub fn view_channel() -> (ViewSender, ViewReceiver) {
    view_channel_with_capacity(DEFAULT_CAPACITY)
}

pub fn view_channel_with_capacity(capacity: usize) -> (ViewSender, ViewReceiver) {
    let notify_any = Arc::new(Notify::new());
    let progress = Arc::new(LatestSlots::new(Arc::clone(&notify_any)));
    let events = Arc::new(DropOldestFifo::new(capacity, Arc::clone(&notify_any)));

    (
        ViewSender {
            progress: Arc::clone(&progress),
            events: Arc::clone(&events),
        },
        ViewReceiver {
            progress,
            events,
            notify_any,
        },
    )
}

impl ViewSender {
    pub fn emit(&self, event: SessionEvent) {
        trace!(event_type = event.event_type(), request_id = ?event.request_id(), "emit");
        match &event {
            SessionEvent::Progress(view) => {
                let key = view.request_id.clone();
                self.progress.set(&key, Envelope::new(event));
            }
            _ => {
                if let Some(evicted) = self.events.push_overwrite(Envelope::new(event)) {
                    warn!(
                        event_type = evicted.event.event_type(),
                        request_id = ?evicted.event.request_id(),
                        dropped_total = self.events.dropped_total(),
                        "view lagging, oldest event dropped"
                    );
                }
            }
        }
    }

    pub fn dropped_total(&self) -> u64 {
        self.events.dropped_total()
    }
}

impl ViewReceiver {
    pub async fn next(&mut self) -> ViewBatch {
        loop {
            if let Some(batch) = self.try_next() {
                return batch;
            }
            self.notify_any.notified().await;
        }
    }

    pub fn try_next(&mut self) -> Option<ViewBatch> {
        let mut snaps = self.progress.take_all();
        if !snaps.is_empty() {
            snaps.sort_by_key(|e| e.header.timestamp);
            return Some(ViewBatch::Snapshots(snaps));
        }
        self.events.try_recv().map(ViewBatch::Event)
    }

    /// Everything pending right now, snapshots flattened in.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut out: Vec<SessionEvent> = Vec::new();
        while let Some(env) = self.events.try_recv() {
            out.push(env.event);
        }
        let mut snaps = self.progress.take_all();
        snaps.sort_by_key(|e| e.header.timestamp);
        out.extend(snaps.into_iter().map(|e| e.event));
        out
    }
}
