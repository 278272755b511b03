//! Realtime feed of a user's orders.

use super::{attach, status_change, text_field, user_key};
use crate::error::Result;
use crate::events::{AppEvent, EventBus};
use crate::subscriptions::SubscriptionManager;
use crate::types::{ChangeKind, ChangePayload, ChannelHandle, EventScope};
use std::sync::Arc;

pub const RESOURCE: &str = "orders";

/// Subscription key for a user's orders.
pub fn key(user_id: &str) -> Result<String> {
    user_key(RESOURCE, user_id)
}

/// Map an order change to `order:created`, `order:status_changed` or
/// `order:updated`. Deletes are not surfaced.
pub fn translate(payload: &ChangePayload) -> Option<AppEvent> {
    match payload.event_type {
        ChangeKind::Insert => Some(AppEvent::OrderCreated {
            order: payload.new_row()?.clone(),
        }),
        ChangeKind::Update => {
            let after = payload.new_row()?.clone();
            let order_id = text_field(&after, "id")?;
            let before = payload.old_row().cloned();
            Some(match status_change(payload) {
                Some((old_status, new_status)) => AppEvent::OrderStatusChanged {
                    order_id,
                    old_status,
                    new_status,
                    before,
                    after,
                },
                None => AppEvent::OrderUpdated {
                    order_id,
                    before,
                    after,
                },
            })
        }
        ChangeKind::Delete => None,
    }
}

/// Subscribe to `user_id`'s orders (`user_id=eq.<id>`).
pub fn subscribe(
    manager: &SubscriptionManager,
    bus: &Arc<EventBus>,
    user_id: &str,
) -> Result<ChannelHandle> {
    let key = key(user_id)?;
    let filter = format!("user_id=eq.{user_id}");
    attach(manager, bus, &key, RESOURCE, Some(&filter), EventScope::All, translate)
}
