//! Keyed realtime subscriptions with automatic recovery.
//!
//! The [`SubscriptionManager`] keeps at most one channel open per logical
//! key (for example `orders_<userId>`):
//! - Subscribing again under a key replaces the old channel
//! - Channel errors are retried with exponential backoff, then given up
//! - Unsubscribing cancels any pending retry
//!
//! Lifecycle changes can be observed through [`SubscriptionManager::watch`].
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new(transport, scheduler);
//!
//! manager.subscribe(
//!     "orders_u1",
//!     "orders",
//!     |payload| {
//!         println!("order change: {:?}", payload.new_row());
//!         Ok(())
//!     },
//!     Some("user_id=eq.u1"),
//!     SubscribeOptions::default(),
//! )?;
//!
//! // On logout
//! manager.unsubscribe_all();
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    MessageCallback, StatusHandle, SubscribeOptions, SubscriptionState, SubscriptionStatus,
    WatcherId,
};
