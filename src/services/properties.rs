//! Realtime feed of property listings.

use super::{attach, status_change, text_field};
use crate::error::{RealtimeError, Result};
use crate::events::{AppEvent, EventBus};
use crate::subscriptions::SubscriptionManager;
use crate::types::{ChangeKind, ChangePayload, ChannelHandle, EventScope};
use std::sync::Arc;

pub const RESOURCE: &str = "properties";

/// Key of the catalogue-wide feed.
pub const CATALOGUE_KEY: &str = "properties";

/// Key for a single listing's feed.
pub fn listing_key(property_id: &str) -> Result<String> {
    if property_id.trim().is_empty() {
        return Err(RealtimeError::InvalidKey("property_".to_string()));
    }
    Ok(format!("property_{property_id}"))
}

pub fn translate(payload: &ChangePayload) -> Option<AppEvent> {
    match payload.event_type {
        ChangeKind::Insert => Some(AppEvent::PropertyCreated {
            property: payload.new_row()?.clone(),
        }),
        ChangeKind::Update => {
            let after = payload.new_row()?.clone();
            let property_id = text_field(&after, "id")?;
            let before = payload.old_row().cloned();
            Some(match status_change(payload) {
                Some((old_status, new_status)) => AppEvent::PropertyStatusChanged {
                    property_id,
                    old_status,
                    new_status,
                    before,
                    after,
                },
                None => AppEvent::PropertyUpdated {
                    property_id,
                    before,
                    after,
                },
            })
        }
        ChangeKind::Delete => {
            let before = payload.old_row()?.clone();
            let property_id = text_field(&before, "id")?;
            Some(AppEvent::PropertyDeleted {
                property_id,
                before,
            })
        }
    }
}

/// Subscribe to every listing change.
pub fn subscribe_all(manager: &SubscriptionManager, bus: &Arc<EventBus>) -> Result<ChannelHandle> {
    attach(manager, bus, CATALOGUE_KEY, RESOURCE, None, EventScope::All, translate)
}

/// Subscribe to one listing (`id=eq.<id>`), e.g. while its detail page is open.
pub fn subscribe_listing(
    manager: &SubscriptionManager,
    bus: &Arc<EventBus>,
    property_id: &str,
) -> Result<ChannelHandle> {
    let key = listing_key(property_id)?;
    let filter = format!("id=eq.{property_id}");
    attach(manager, bus, &key, RESOURCE, Some(&filter), EventScope::All, translate)
}
