//! Realtime feed of a user's cart lines.

use super::{attach, user_key};
use crate::error::Result;
use crate::events::{AppEvent, CartAction, EventBus};
use crate::subscriptions::SubscriptionManager;
use crate::types::{ChangeKind, ChangePayload, ChannelHandle, EventScope};
use std::sync::Arc;

pub const RESOURCE: &str = "cart_items";

pub fn key(user_id: &str) -> Result<String> {
    user_key("cart", user_id)
}

pub fn translate(payload: &ChangePayload) -> Option<AppEvent> {
    let (action, item) = match payload.event_type {
        ChangeKind::Insert => (CartAction::Added, payload.new_row()?),
        ChangeKind::Update => (CartAction::Updated, payload.new_row()?),
        ChangeKind::Delete => (CartAction::Removed, payload.old_row()?),
    };
    Some(AppEvent::CartUpdated {
        action,
        item: item.clone(),
    })
}

pub fn subscribe(
    manager: &SubscriptionManager,
    bus: &Arc<EventBus>,
    user_id: &str,
) -> Result<ChannelHandle> {
    let key = key(user_id)?;
    let filter = format!("user_id=eq.{user_id}");
    attach(manager, bus, &key, RESOURCE, Some(&filter), EventScope::All, translate)
}
