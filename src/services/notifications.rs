//! Realtime feed of a user's notifications.

use super::{attach, user_key};
use crate::error::Result;
use crate::events::{AppEvent, EventBus};
use crate::subscriptions::SubscriptionManager;
use crate::types::{ChangeKind, ChangePayload, ChannelHandle, EventScope};
use std::sync::Arc;

pub const RESOURCE: &str = "notifications";

pub fn key(user_id: &str) -> Result<String> {
    user_key(RESOURCE, user_id)
}

/// Only new notifications are surfaced.
pub fn translate(payload: &ChangePayload) -> Option<AppEvent> {
    match payload.event_type {
        ChangeKind::Insert => Some(AppEvent::NotificationReceived {
            notification: payload.new_row()?.clone(),
        }),
        _ => None,
    }
}

pub fn subscribe(
    manager: &SubscriptionManager,
    bus: &Arc<EventBus>,
    user_id: &str,
) -> Result<ChannelHandle> {
    let key = key(user_id)?;
    let filter = format!("user_id=eq.{user_id}");
    attach(manager, bus, &key, RESOURCE, Some(&filter), EventScope::Insert, translate)
}
