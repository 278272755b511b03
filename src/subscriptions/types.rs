//! Subscription types for the realtime manager.

use crate::error::CallbackError;
use crate::types::{ChangePayload, ChannelHandle, EventScope, RowFilter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Message handler attached to a subscription.
///
/// Errors and panics are caught by the manager and logged.
pub type MessageCallback =
    Arc<dyn Fn(&ChangePayload) -> Result<(), CallbackError> + Send + Sync + 'static>;

/// Optional knobs for a subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Change kinds to listen to. Default: all.
    pub scope: EventScope,

    /// Re-check the row filter on delivered payloads.
    /// None = use the manager's configured default.
    pub verify_filter: Option<bool>,
}

impl SubscribeOptions {
    pub fn scope(scope: EventScope) -> Self {
        Self {
            scope,
            ..Default::default()
        }
    }
}

/// Everything needed to (re)open a subscription's channel, recorded at
/// subscribe time.
pub(crate) struct SubscriptionSpec {
    pub resource: String,
    pub filter: Option<RowFilter>,
    pub scope: EventScope,
    pub verify_filter: bool,
    pub callback: MessageCallback,
}

impl fmt::Debug for SubscriptionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSpec")
            .field("resource", &self.resource)
            .field("filter", &self.filter)
            .field("scope", &self.scope)
            .field("verify_filter", &self.verify_filter)
            .finish_non_exhaustive()
    }
}

/// Lifecycle state of a tracked key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    /// A channel is open (or opening) and delivering.
    Active,
    /// The channel failed; a retry timer is pending.
    BackoffWait,
}

/// Lifecycle notifications published to watchers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// A channel was opened for the key.
    Subscribed { key: String, channel: ChannelHandle },

    /// The transport reported an error on the key's channel.
    ChannelError { key: String, reason: String },

    /// A retry was scheduled.
    RetryScheduled {
        key: String,
        attempt: u32,
        delay: Duration,
    },

    /// Retries ran out; the key is no longer tracked.
    Exhausted { key: String, attempts: u32 },

    /// The key was explicitly unsubscribed.
    Unsubscribed { key: String },
}

impl SubscriptionStatus {
    pub fn key(&self) -> &str {
        match self {
            SubscriptionStatus::Subscribed { key, .. }
            | SubscriptionStatus::ChannelError { key, .. }
            | SubscriptionStatus::RetryScheduled { key, .. }
            | SubscriptionStatus::Exhausted { key, .. }
            | SubscriptionStatus::Unsubscribed { key } => key,
        }
    }
}

/// Unique identifier for a status watcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatcherId(pub u64);

/// Receiving end of a status watch.
pub struct StatusHandle {
    pub id: WatcherId,
    /// Channel to receive status events.
    pub receiver: crossbeam_channel::Receiver<SubscriptionStatus>,
}

impl StatusHandle {
    /// Receive the next status event (blocking).
    pub fn recv(&self) -> Result<SubscriptionStatus, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a status event (non-blocking).
    pub fn try_recv(&self) -> Result<SubscriptionStatus, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<SubscriptionStatus, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything buffered right now.
    pub fn drain(&self) -> Vec<SubscriptionStatus> {
        self.receiver.try_iter().collect()
    }
}
