//! Application event fan-out.
//!
//! Realtime services translate raw change payloads into [`AppEvent`]s and
//! emit them on an [`EventBus`]. Consumers register explicitly, either with
//! a callback or a bounded channel, and can be removed again by id.
//!
//! # Example
//!
//! ```ignore
//! let bus = EventBus::new();
//! bus.on("order:*", |event| println!("{}", event.name()));
//! let notifications = bus.channel("notification:received", 64);
//! ```

mod bus;
mod types;

pub use bus::{EventBus, EventReceiver, ListenerId};
pub use types::{AppEvent, CartAction, Topic};
