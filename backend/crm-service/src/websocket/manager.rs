//! Change Broadcaster
//!
//! Keeps a registry of observer channels and fans every published event out
//! to all of them. Delivery is best-effort:
//! - each observer gets a bounded queue; events arrive in publish order
//! - an observer whose queue is closed or full is evicted on the spot
//! - nothing is replayed to observers that subscribe later
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use super::ChangeEvent;
use crate::metrics;

/// Observer handle returned by [`ChangeBroadcaster::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<ChangeEvent>,
}

/// Per-publish delivery summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub evicted: usize,
}

#[derive(Clone)]
pub struct ChangeBroadcaster {
    observers: Arc<Mutex<HashMap<Uuid, mpsc::Sender<ChangeEvent>>>>,
    buffer: usize,
}

impl ChangeBroadcaster {
    pub fn new(buffer: usize) -> Self {
        Self {
            observers: Arc::new(Mutex::new(HashMap::new())),
            buffer: buffer.max(1),
        }
    }

    pub async fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        self.observers.lock().await.insert(id, sender);
        debug!(observer_id = %id, "Observer subscribed");
        Subscription { id, receiver }
    }

    /// Remove an observer. Unknown ids are ignored.
    pub async fn unsubscribe(&self, id: Uuid) {
        if self.observers.lock().await.remove(&id).is_some() {
            debug!(observer_id = %id, "Observer unsubscribed");
        }
    }

    /// Deliver `event` to every registered observer.
    ///
    /// The registry lock is held for the whole fan-out, so concurrent
    /// publishes reach all observers in the same relative order.
    pub async fn publish(&self, event: ChangeEvent) -> PublishReport {
        let mut observers = self.observers.lock().await;
        let mut report = PublishReport::default();
        let mut dead = Vec::new();

        for (id, sender) in observers.iter() {
            match sender.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(*id),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(observer_id = %id, event = event.kind(), "Observer queue full, evicting");
                    dead.push(*id);
                }
            }
        }

        for id in &dead {
            observers.remove(id);
        }
        report.evicted = dead.len();

        metrics::record_broadcast(report.delivered, report.evicted);
        debug!(
            event = event.kind(),
            delivered = report.delivered,
            evicted = report.evicted,
            "Published change event"
        );
        report
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.lock().await.len()
    }
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
