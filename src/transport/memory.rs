//! In-process stand-in for the platform's change feed.

use super::{ChannelRequest, ChannelSink, RealtimeTransport};
use crate::types::{ChangePayload, ChannelHandle};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::debug;

struct OpenChannel {
    request: ChannelRequest,
    sink: ChannelSink,
}

struct MemoryState {
    next_id: u64,
    channels: BTreeMap<ChannelHandle, OpenChannel>,
    opened: usize,
    closed: usize,
    /// Opens still to be rejected with an immediate channel error.
    reject_next: usize,
    server_filtering: bool,
}

/// Transport that keeps channels in memory and lets callers inject changes
/// and failures.
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    /// New transport that applies row filters server-side.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_id: 1,
                channels: BTreeMap::new(),
                opened: 0,
                closed: 0,
                reject_next: 0,
                server_filtering: true,
            }),
        }
    }

    /// New transport that ignores row filters, forwarding every change on a
    /// resource to all its channels.
    pub fn without_server_filtering() -> Self {
        let transport = Self::new();
        transport.set_server_filtering(false);
        transport
    }

    pub fn set_server_filtering(&self, enabled: bool) {
        self.state.lock().server_filtering = enabled;
    }

    /// Make the next `n` opens fail with a channel error right away.
    pub fn reject_next_opens(&self, n: usize) {
        self.state.lock().reject_next = n;
    }

    /// Push a change to every open channel that should see it.
    /// Returns the number of channels it was delivered to.
    pub fn emit(&self, payload: ChangePayload) -> usize {
        let sinks: Vec<ChannelSink> = {
            let state = self.state.lock();
            state
                .channels
                .values()
                .filter(|ch| {
                    if state.server_filtering {
                        ch.request.accepts(&payload)
                    } else {
                        ch.request.resource == payload.table
                    }
                })
                .map(|ch| ch.sink.clone())
                .collect()
        };

        for sink in &sinks {
            sink.deliver(payload.clone());
        }
        sinks.len()
    }

    /// Report a channel error on one channel. Returns false if it is not open.
    pub fn fail_channel(&self, handle: ChannelHandle, reason: &str) -> bool {
        let sink = self.state.lock().channels.get(&handle).map(|ch| ch.sink.clone());
        match sink {
            Some(sink) => {
                sink.fail(reason);
                true
            }
            None => false,
        }
    }

    /// Report a channel error on every channel of a resource.
    pub fn fail_resource(&self, resource: &str, reason: &str) -> usize {
        let sinks: Vec<ChannelSink> = self
            .state
            .lock()
            .channels
            .values()
            .filter(|ch| ch.request.resource == resource)
            .map(|ch| ch.sink.clone())
            .collect();

        for sink in &sinks {
            sink.fail(reason);
        }
        sinks.len()
    }

    pub fn is_open(&self, handle: ChannelHandle) -> bool {
        self.state.lock().channels.contains_key(&handle)
    }

    pub fn open_channels(&self) -> Vec<ChannelHandle> {
        self.state.lock().channels.keys().copied().collect()
    }

    /// Open channels whose topic is `topic`.
    pub fn channels_for_topic(&self, topic: &str) -> Vec<ChannelHandle> {
        self.state
            .lock()
            .channels
            .iter()
            .filter(|(_, ch)| ch.request.topic == topic)
            .map(|(handle, _)| *handle)
            .collect()
    }

    pub fn request(&self, handle: ChannelHandle) -> Option<ChannelRequest> {
        self.state
            .lock()
            .channels
            .get(&handle)
            .map(|ch| ch.request.clone())
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().channels.len()
    }

    /// Channels ever opened.
    pub fn opened_total(&self) -> usize {
        self.state.lock().opened
    }

    /// Channels ever closed.
    pub fn closed_total(&self) -> usize {
        self.state.lock().closed
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeTransport for MemoryTransport {
    fn open_channel(&self, request: ChannelRequest, sink: ChannelSink) -> ChannelHandle {
        let (handle, reject) = {
            let mut state = self.state.lock();
            let handle = ChannelHandle(state.next_id);
            state.next_id += 1;
            state.opened += 1;

            let reject = state.reject_next > 0;
            if reject {
                state.reject_next -= 1;
            }

            debug!(channel = %handle, topic = %request.topic, resource = %request.resource, "channel opened");
            state.channels.insert(
                handle,
                OpenChannel {
                    request,
                    sink: sink.clone(),
                },
            );
            (handle, reject)
        };

        if reject {
            sink.fail("join rejected");
        }
        handle
    }

    fn close_channel(&self, handle: ChannelHandle) {
        let mut state = self.state.lock();
        if state.channels.remove(&handle).is_some() {
            state.closed += 1;
            debug!(channel = %handle, "channel closed");
        }
    }
}
