//! Per-resource realtime wrappers.
//!
//! Each wrapper knows its subscription key, resource, row filter and event
//! scope, and translates raw change payloads into [`AppEvent`]s emitted on
//! the session's [`EventBus`]. Changes that map to no event are skipped.

pub mod cart;
pub mod notifications;
pub mod orders;
pub mod properties;

use crate::error::{RealtimeError, Result};
use crate::events::{AppEvent, EventBus};
use crate::subscriptions::{SubscribeOptions, SubscriptionManager};
use crate::types::{ChangePayload, ChannelHandle, EventScope};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Pure payload-to-event mapping used by a wrapper.
pub type Translator = fn(&ChangePayload) -> Option<AppEvent>;

/// Subscribe `translate`'s output to the bus under `key`.
pub(crate) fn attach(
    manager: &SubscriptionManager,
    bus: &Arc<EventBus>,
    key: &str,
    resource: &str,
    filter: Option<&str>,
    scope: EventScope,
    translate: Translator,
) -> Result<ChannelHandle> {
    let bus = Arc::clone(bus);
    let event_key = key.to_string();

    manager.subscribe(
        key,
        resource,
        move |payload: &ChangePayload| {
            match translate(payload) {
                Some(event) => {
                    bus.emit(event);
                }
                None => {
                    debug!(key = %event_key, event = %payload.event_type, "change not mapped to an event");
                }
            }
            Ok(())
        },
        filter,
        SubscribeOptions::scope(scope),
    )
}

/// Per-user key such as `orders_u1`.
pub(crate) fn user_key(prefix: &str, user_id: &str) -> Result<String> {
    if user_id.trim().is_empty() {
        return Err(RealtimeError::InvalidKey(format!("{prefix}_")));
    }
    Ok(format!("{prefix}_{user_id}"))
}

/// Column value as text; numbers are rendered, other types are absent.
pub(crate) fn text_field(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Old and new `status` of an update, when the status actually changed.
/// Requires the old row to carry the column.
pub(crate) fn status_change(payload: &ChangePayload) -> Option<(Option<String>, String)> {
    let new_status = text_field(payload.new_row()?, "status")?;
    let old_status = payload.old_row().and_then(|old| text_field(old, "status"));
    match old_status {
        Some(old) if old != new_status => Some((Some(old), new_status)),
        _ => None,
    }
}
