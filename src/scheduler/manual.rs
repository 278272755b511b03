//! Simulated-time scheduler.

use super::{Scheduler, TimerId, TimerTask};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

struct ManualState {
    /// Simulated time since construction.
    now: Duration,
    next_id: u64,
    /// Pending tasks ordered by (deadline, id).
    queue: BTreeMap<(Duration, u64), TimerTask>,
    /// Deadline of each pending id, for cancellation.
    deadlines: HashMap<u64, Duration>,
    /// Every delay ever requested, in order.
    history: Vec<Duration>,
}

/// Scheduler driven by explicit calls to [`advance`](Self::advance).
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: Duration::ZERO,
                next_id: 1,
                queue: BTreeMap::new(),
                deadlines: HashMap::new(),
                history: Vec::new(),
            }),
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of timers waiting to fire.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.state.lock().deadlines.contains_key(&id.0)
    }

    /// Deadline of the earliest pending timer.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.state.lock().queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// All delays requested so far, including cancelled ones.
    pub fn scheduled_delays(&self) -> Vec<Duration> {
        self.state.lock().history.clone()
    }

    /// Move simulated time forward by `by`, firing every task that falls due,
    /// in deadline order. Tasks scheduled by fired tasks run too if they are
    /// due before the new time. Returns the number of tasks fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut fired = 0;

        while let Some(task) = self.pop_due(target) {
            // Run outside the lock so the task may schedule or cancel.
            task();
            fired += 1;
        }

        let mut state = self.state.lock();
        if state.now < target {
            state.now = target;
        }
        fired
    }

    /// Jump to the earliest pending deadline and fire that one task.
    /// Returns false if nothing is pending.
    pub fn fire_next(&self) -> bool {
        let Some(deadline) = self.next_deadline() else {
            return false;
        };
        let task = {
            let mut state = self.state.lock();
            let Some(((_, id), task)) = state.queue.pop_first() else {
                return false;
            };
            state.deadlines.remove(&id);
            state.now = state.now.max(deadline);
            task
        };
        task();
        true
    }

    fn pop_due(&self, target: Duration) -> Option<TimerTask> {
        let mut state = self.state.lock();
        let (&(deadline, id), _) = state.queue.iter().next()?;
        if deadline > target {
            return None;
        }
        let task = state.queue.remove(&(deadline, id))?;
        state.deadlines.remove(&id);
        if state.now < deadline {
            state.now = deadline;
        }
        Some(task)
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;

        let deadline = state.now + delay;
        state.queue.insert((deadline, id), task);
        state.deadlines.insert(id, deadline);
        state.history.push(delay);

        TimerId(id)
    }

    fn cancel(&self, id: TimerId) {
        let mut state = self.state.lock();
        if let Some(deadline) = state.deadlines.remove(&id.0) {
            state.queue.remove(&(deadline, id.0));
        }
    }
}
