//! # Estate Realtime
//!
//! The realtime layer of a property marketplace client: keyed change-feed
//! subscriptions over a hosted platform, with automatic recovery.
//!
//! ## Core Concepts
//!
//! - **Subscriptions**: one live channel per logical key, replaced rather
//!   than stacked, retried with exponential backoff on channel errors
//! - **Transport**: the platform's change feed behind a trait
//! - **Scheduler**: injectable timers (simulated or thread-backed)
//! - **Events**: typed `<domain>:<verb>` application events on an explicit bus
//! - **Session**: one manager and bus per logged-in user
//!
//! ## Example
//!
//! ```ignore
//! use estate_realtime::{RealtimeConfig, RealtimeSession, ThreadScheduler};
//!
//! let session = RealtimeSession::start(
//!     &RealtimeConfig::default(),
//!     transport,
//!     Arc::new(ThreadScheduler::new()?),
//!     "u1",
//! )?;
//!
//! session.bus().on("order:*", |event| println!("{}", event.name()));
//!
//! // Later
//! session.logout();
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod subscriptions;
pub mod transport;
pub mod types;

// Re-exports
pub use backoff::{BackoffPolicy, RetryDecision, RetryState};
pub use config::RealtimeConfig;
pub use error::{CallbackError, RealtimeError, Result};
pub use events::{AppEvent, CartAction, EventBus, EventReceiver, ListenerId, Topic};
pub use scheduler::{ManualScheduler, Scheduler, ThreadScheduler, TimerId, TimerTask};
pub use session::RealtimeSession;
pub use subscriptions::{
    MessageCallback, StatusHandle, SubscribeOptions, SubscriptionManager, SubscriptionState,
    SubscriptionStatus, WatcherId,
};
pub use transport::{ChannelEvents, ChannelRequest, ChannelSink, MemoryTransport, RealtimeTransport};
pub use types::*;
