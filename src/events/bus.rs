//! Explicit observer registry for application events.

use super::types::{AppEvent, Topic};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Unique identifier for a registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

type EventCallback = Arc<dyn Fn(&AppEvent) + Send + Sync + 'static>;

#[derive(Clone)]
enum Delivery {
    Callback(EventCallback),
    Channel(Sender<AppEvent>),
}

struct Listener {
    id: ListenerId,
    topic: Topic,
    delivery: Delivery,
}

/// Channel-backed listener registration.
pub struct EventReceiver {
    pub id: ListenerId,
    pub receiver: Receiver<AppEvent>,
}

impl EventReceiver {
    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<AppEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<AppEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything buffered right now.
    pub fn drain(&self) -> Vec<AppEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Fans application events out to registered listeners.
///
/// Callbacks run on the emitting thread without any bus lock held, so they
/// may register or remove listeners. Channel listeners whose buffer is full
/// or whose receiver is gone are removed.
pub struct EventBus {
    listeners: RwLock<Vec<Listener>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn register(&self, topic: Topic, delivery: Delivery) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push(Listener {
            id,
            topic,
            delivery,
        });
        id
    }

    /// Call `callback` for every matching event.
    pub fn on<F>(&self, topic: impl Into<Topic>, callback: F) -> ListenerId
    where
        F: Fn(&AppEvent) + Send + Sync + 'static,
    {
        self.register(topic.into(), Delivery::Callback(Arc::new(callback)))
    }

    /// Buffer matching events in a bounded channel.
    pub fn channel(&self, topic: impl Into<Topic>, buffer: usize) -> EventReceiver {
        let (sender, receiver) = bounded(buffer);
        let id = self.register(topic.into(), Delivery::Channel(sender));
        EventReceiver { id, receiver }
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    /// Deliver `event` to every matching listener. Returns how many
    /// listeners received it.
    pub fn emit(&self, event: AppEvent) -> usize {
        let targets: Vec<(ListenerId, Delivery)> = {
            let listeners = self.listeners.read();
            listeners
                .iter()
                .filter(|l| l.topic.matches(&event))
                .map(|l| (l.id, l.delivery.clone()))
                .collect()
        };

        let mut delivered = 0;
        let mut to_remove = Vec::new();

        for (id, delivery) in targets {
            match delivery {
                Delivery::Callback(callback) => {
                    match panic::catch_unwind(AssertUnwindSafe(|| (*callback)(&event))) {
                        Ok(()) => delivered += 1,
                        Err(_) => warn!(listener = id.0, event = event.name(), "event listener panicked"),
                    }
                }
                Delivery::Channel(sender) => {
                    if sender.try_send(event.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        to_remove.push(id);
                    }
                }
            }
        }

        if !to_remove.is_empty() {
            debug!(count = to_remove.len(), "dropping stalled event listeners");
            self.listeners.write().retain(|l| !to_remove.contains(&l.id));
        }

        delivered
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
