//! Wall-clock scheduler backed by one worker thread.

use super::{Scheduler, TimerId, TimerTask};
use crate::error::Result;
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

enum Command {
    Schedule {
        id: u64,
        deadline: Instant,
        task: TimerTask,
    },
    Cancel(u64),
    Shutdown,
}

/// Scheduler that fires tasks on a dedicated thread at real deadlines.
///
/// Tasks run sequentially on the worker thread, so they never race with
/// each other.
pub struct ThreadScheduler {
    sender: Sender<Command>,
    next_id: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl ThreadScheduler {
    /// Spawn the worker thread.
    pub fn new() -> Result<Self> {
        let (sender, receiver) = unbounded::<Command>();

        let worker = thread::Builder::new()
            .name("realtime-timers".to_string())
            .spawn(move || {
                let mut queue: BTreeMap<(Instant, u64), TimerTask> = BTreeMap::new();
                let mut deadlines: HashMap<u64, Instant> = HashMap::new();

                loop {
                    let next = queue.keys().next().map(|(deadline, _)| *deadline);
                    let command = match next {
                        Some(deadline) => match receiver.recv_deadline(deadline) {
                            Ok(command) => Some(command),
                            Err(RecvTimeoutError::Timeout) => None,
                            Err(RecvTimeoutError::Disconnected) => break,
                        },
                        None => match receiver.recv() {
                            Ok(command) => Some(command),
                            Err(_) => break,
                        },
                    };

                    match command {
                        Some(Command::Schedule { id, deadline, task }) => {
                            queue.insert((deadline, id), task);
                            deadlines.insert(id, deadline);
                        }
                        Some(Command::Cancel(id)) => {
                            if let Some(deadline) = deadlines.remove(&id) {
                                queue.remove(&(deadline, id));
                            }
                        }
                        Some(Command::Shutdown) => break,
                        None => {}
                    }

                    let now = Instant::now();
                    while let Some(entry) = queue.first_entry() {
                        if entry.key().0 > now {
                            break;
                        }
                        let ((_, id), task) = entry.remove_entry();
                        deadlines.remove(&id);
                        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                            warn!(timer = id, "timer task panicked");
                        }
                    }
                }

                debug!(dropped = queue.len(), "timer thread stopped");
            })?;

        let worker_id = worker.thread().id();

        Ok(Self {
            sender,
            next_id: AtomicU64::new(1),
            worker: Mutex::new(Some(worker)),
            worker_id,
        })
    }

    /// Stop the worker. Pending timers are discarded.
    pub fn shutdown(&self) {
        let _ = self.sender.send(Command::Shutdown);
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            // The last owner may be dropped from inside a timer task.
            if thread::current().id() != self.worker_id {
                let _ = handle.join();
            }
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + delay;
        if self
            .sender
            .send(Command::Schedule { id, deadline, task })
            .is_err()
        {
            debug!(timer = id, "timer thread gone; task dropped");
        }
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) {
        let _ = self.sender.send(Command::Cancel(id.0));
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
