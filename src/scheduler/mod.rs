//! One-shot timer scheduling behind an injectable trait.
//!
//! The subscription manager never sleeps or reads the wall clock itself; it
//! asks a [`Scheduler`] to run a task later. Two implementations ship:
//!
//! - [`ManualScheduler`]: simulated time, advanced explicitly. Used in tests
//!   so backoff timing is deterministic.
//! - [`ThreadScheduler`]: a single worker thread firing tasks at real
//!   deadlines.
//!
//! # Example
//!
//! ```ignore
//! let scheduler = ManualScheduler::new();
//! scheduler.schedule(Duration::from_secs(1), Box::new(|| println!("tick")));
//! scheduler.advance(Duration::from_secs(1)); // prints "tick"
//! ```

mod manual;
mod thread;

pub use manual::ManualScheduler;
pub use thread::ThreadScheduler;

use std::fmt;
use std::time::Duration;

/// Work to run when a timer fires.
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Identifier for a scheduled timer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Debug for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timer({})", self.0)
    }
}

/// Runs one-shot tasks after a delay.
///
/// Implementations must never run a task from inside `schedule` or `cancel`:
/// callers may hold their own locks while scheduling.
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`.
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId;

    /// Cancel a pending timer. Unknown or already-fired ids are ignored.
    fn cancel(&self, id: TimerId);
}
