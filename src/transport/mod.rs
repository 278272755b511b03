//! The seam to the hosted platform's change-feed transport.
//!
//! The platform is opaque: a transport opens a channel for a resource and
//! reports back through a [`ChannelSink`], either delivering change payloads
//! or signalling a channel error. Only the party that opened a channel (the
//! subscription manager) closes it.

mod memory;

pub use memory::MemoryTransport;

use crate::types::{ChangePayload, ChannelHandle, EventScope, RowFilter};
use std::fmt;
use std::sync::Arc;

/// Parameters for opening a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelRequest {
    /// Channel topic, derived from the subscription key.
    pub topic: String,

    /// Remote collection to watch.
    pub resource: String,

    /// Server-side row filter.
    pub filter: Option<RowFilter>,

    /// Change kinds to receive.
    pub scope: EventScope,
}

impl ChannelRequest {
    /// Whether a payload belongs on this channel under the request's
    /// resource, scope and filter.
    pub fn accepts(&self, payload: &ChangePayload) -> bool {
        payload.table == self.resource
            && self.scope.matches(payload.event_type)
            && self.filter.as_ref().map_or(true, |f| f.matches(payload))
    }
}

/// Receiver side of a channel's callbacks.
pub trait ChannelEvents: Send + Sync {
    fn on_message(&self, payload: ChangePayload);
    fn on_error(&self, reason: String);
}

/// Where a transport reports messages and errors for one channel.
#[derive(Clone)]
pub struct ChannelSink {
    target: Arc<dyn ChannelEvents>,
}

impl ChannelSink {
    pub fn new(target: Arc<dyn ChannelEvents>) -> Self {
        Self { target }
    }

    /// Deliver one change payload.
    pub fn deliver(&self, payload: ChangePayload) {
        self.target.on_message(payload);
    }

    /// Report a channel error.
    pub fn fail(&self, reason: impl Into<String>) {
        self.target.on_error(reason.into());
    }
}

impl fmt::Debug for ChannelSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSink").finish_non_exhaustive()
    }
}

/// Opens and closes change-feed channels on the platform.
///
/// `open_channel` must not report through `sink` while holding any lock the
/// sink's receiver could need; errors may be reported before it returns.
pub trait RealtimeTransport: Send + Sync {
    fn open_channel(&self, request: ChannelRequest, sink: ChannelSink) -> ChannelHandle;

    fn close_channel(&self, handle: ChannelHandle);
}
