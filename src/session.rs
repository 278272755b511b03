//! Per-user realtime session.

use crate::config::RealtimeConfig;
use crate::error::{RealtimeError, Result};
use crate::events::EventBus;
use crate::scheduler::Scheduler;
use crate::services::{cart, notifications, orders, properties};
use crate::subscriptions::SubscriptionManager;
use crate::transport::RealtimeTransport;
use crate::types::ChannelHandle;
use std::sync::Arc;
use tracing::info;

/// Owns the subscription manager and event bus for one logged-in user.
///
/// Starting a session subscribes the user's standard feeds (orders,
/// notifications, cart and the property catalogue). [`logout`](Self::logout)
/// tears every subscription down.
pub struct RealtimeSession {
    user_id: String,
    manager: SubscriptionManager,
    bus: Arc<EventBus>,
}

impl RealtimeSession {
    pub fn start(
        config: &RealtimeConfig,
        transport: Arc<dyn RealtimeTransport>,
        scheduler: Arc<dyn Scheduler>,
        user_id: &str,
    ) -> Result<Self> {
        if user_id.trim().is_empty() {
            return Err(RealtimeError::InvalidKey(user_id.to_string()));
        }

        let manager = SubscriptionManager::with_config(config, transport, scheduler)?;
        let bus = Arc::new(EventBus::new());

        orders::subscribe(&manager, &bus, user_id)?;
        notifications::subscribe(&manager, &bus, user_id)?;
        cart::subscribe(&manager, &bus, user_id)?;
        properties::subscribe_all(&manager, &bus)?;

        info!(user_id, feeds = manager.len(), "realtime session started");

        Ok(Self {
            user_id: user_id.to_string(),
            manager,
            bus,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn manager(&self) -> &SubscriptionManager {
        &self.manager
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Follow one listing while its page is open.
    pub fn watch_property(&self, property_id: &str) -> Result<ChannelHandle> {
        properties::subscribe_listing(&self.manager, &self.bus, property_id)
    }

    pub fn unwatch_property(&self, property_id: &str) -> Result<()> {
        let key = properties::listing_key(property_id)?;
        self.manager.unsubscribe(&key);
        Ok(())
    }

    /// Tear down all subscriptions and listeners.
    pub fn logout(self) {
        info!(user_id = %self.user_id, "realtime session ended");
        self.manager.unsubscribe_all();
        self.bus.clear();
    }
}
