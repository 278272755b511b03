//! Subscription manager: one live channel per key, with backoff recovery.

use crate::backoff::{BackoffPolicy, RetryDecision, RetryState};
use crate::config::RealtimeConfig;
use crate::error::{CallbackError, RealtimeError, Result};
use crate::scheduler::{Scheduler, TimerId};
use crate::transport::{ChannelEvents, ChannelRequest, ChannelSink, RealtimeTransport};
use crate::types::{ChangePayload, ChannelHandle, RowFilter};
use crossbeam_channel::{bounded, Sender};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use super::types::{
    MessageCallback, StatusHandle, SubscribeOptions, SubscriptionSpec, SubscriptionState,
    SubscriptionStatus, WatcherId,
};

/// Default buffered status events per watcher.
const DEFAULT_STATUS_BUFFER: usize = 256;

/// Tracked state for one key.
struct Entry {
    /// Bumped on every (re)open; callbacks and timers from older
    /// generations are ignored.
    generation: u64,
    spec: Arc<SubscriptionSpec>,
    channel: Option<ChannelHandle>,
    timer: Option<TimerId>,
    state: SubscriptionState,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<String, Entry>,
    retries: HashMap<String, RetryState>,
    next_generation: u64,
}

impl Registry {
    /// Install a fresh entry for `key`, returning its generation and the
    /// entry it replaced (which the caller must release).
    fn install(
        &mut self,
        key: &str,
        spec: Arc<SubscriptionSpec>,
        keep_retry: bool,
    ) -> (u64, Option<Entry>) {
        self.next_generation += 1;
        let generation = self.next_generation;

        if !keep_retry {
            self.retries.remove(key);
        }

        let replaced = self.entries.insert(
            key.to_string(),
            Entry {
                generation,
                spec,
                channel: None,
                timer: None,
                state: SubscriptionState::Active,
            },
        );
        (generation, replaced)
    }
}

struct Watcher {
    id: WatcherId,
    sender: Sender<SubscriptionStatus>,
}

struct Shared {
    registry: Mutex<Registry>,
    watchers: RwLock<Vec<Watcher>>,
    next_watcher: AtomicU64,
    transport: Arc<dyn RealtimeTransport>,
    scheduler: Arc<dyn Scheduler>,
    policy: BackoffPolicy,
    verify_filters: bool,
    status_buffer: usize,
}

/// Routes one channel's callbacks back to the manager.
struct Route {
    shared: Weak<Shared>,
    key: String,
    generation: u64,
}

impl ChannelEvents for Route {
    fn on_message(&self, payload: ChangePayload) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_message(&self.key, self.generation, payload);
        }
    }

    fn on_error(&self, reason: String) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_error(&self.key, self.generation, reason);
        }
    }
}

impl Shared {
    /// Open the channel for an entry installed under `generation`.
    fn connect(
        self: &Arc<Self>,
        key: &str,
        generation: u64,
        spec: &SubscriptionSpec,
    ) -> ChannelHandle {
        let request = ChannelRequest {
            topic: format!("realtime:{key}"),
            resource: spec.resource.clone(),
            filter: spec.filter.clone(),
            scope: spec.scope,
        };
        let sink = ChannelSink::new(Arc::new(Route {
            shared: Arc::downgrade(self),
            key: key.to_string(),
            generation,
        }));

        // No lock held: the transport may report an error before returning.
        let handle = self.transport.open_channel(request, sink);

        let stored = {
            let mut registry = self.registry.lock();
            match registry.entries.get_mut(key) {
                Some(entry)
                    if entry.generation == generation
                        && entry.state == SubscriptionState::Active =>
                {
                    entry.channel = Some(handle);
                    true
                }
                _ => false,
            }
        };

        if stored {
            debug!(key, channel = %handle, resource = %spec.resource, "subscribed");
            self.publish(SubscriptionStatus::Subscribed {
                key: key.to_string(),
                channel: handle,
            });
        } else {
            // Superseded, torn down or failed while opening.
            self.transport.close_channel(handle);
        }
        handle
    }

    /// Cancel the timer and close the channel of a removed entry.
    fn release(&self, entry: Entry) {
        if let Some(timer) = entry.timer {
            self.scheduler.cancel(timer);
        }
        if let Some(channel) = entry.channel {
            self.transport.close_channel(channel);
        }
    }

    fn handle_message(&self, key: &str, generation: u64, payload: ChangePayload) {
        let spec = {
            let mut guard = self.registry.lock();
            let registry = &mut *guard;
            match registry.entries.get(key) {
                Some(entry)
                    if entry.generation == generation
                        && entry.state == SubscriptionState::Active =>
                {
                    // Delivery proves the channel healthy.
                    registry.retries.remove(key);
                    Arc::clone(&entry.spec)
                }
                _ => {
                    debug!(key, generation, "message for stale subscription ignored");
                    return;
                }
            }
        };

        if !spec.scope.matches(payload.event_type) {
            debug!(key, event = %payload.event_type, "message outside event scope ignored");
            return;
        }
        if spec.verify_filter {
            if let Some(filter) = &spec.filter {
                if !filter.matches(&payload) {
                    debug!(key, filter = %filter, "message rejected by client-side filter");
                    return;
                }
            }
        }

        invoke(key, &spec.callback, &payload);
    }

    fn handle_error(self: &Arc<Self>, key: &str, generation: u64, reason: String) {
        let (decision, channel) = {
            let mut guard = self.registry.lock();
            let registry = &mut *guard;

            let entry = match registry.entries.get_mut(key) {
                Some(entry)
                    if entry.generation == generation
                        && entry.state == SubscriptionState::Active =>
                {
                    entry
                }
                _ => {
                    debug!(key, generation, %reason, "error for stale subscription ignored");
                    return;
                }
            };

            let attempts = registry.retries.get(key).map_or(0, |r| r.attempts);
            let decision = self.policy.next(attempts);
            let channel = entry.channel.take();

            match decision {
                RetryDecision::Exhausted => {
                    registry.retries.remove(key);
                    registry.entries.remove(key);
                }
                RetryDecision::Retry { attempt, delay } => {
                    registry
                        .retries
                        .insert(key.to_string(), RetryState { attempts: attempt });

                    let weak = Arc::downgrade(self);
                    let retry_key = key.to_string();
                    let timer = self.scheduler.schedule(
                        delay,
                        Box::new(move || {
                            if let Some(shared) = weak.upgrade() {
                                shared.retry(&retry_key, generation);
                            }
                        }),
                    );

                    entry.state = SubscriptionState::BackoffWait;
                    entry.timer = Some(timer);
                }
            }
            (decision, channel)
        };

        if let Some(channel) = channel {
            self.transport.close_channel(channel);
        }

        self.publish(SubscriptionStatus::ChannelError {
            key: key.to_string(),
            reason: reason.clone(),
        });

        match decision {
            RetryDecision::Retry { attempt, delay } => {
                debug!(key, attempt, delay_ms = delay.as_millis() as u64, %reason, "channel error, retry scheduled");
                self.publish(SubscriptionStatus::RetryScheduled {
                    key: key.to_string(),
                    attempt,
                    delay,
                });
            }
            RetryDecision::Exhausted => {
                warn!(key, attempts = self.policy.max_attempts, %reason, "retries exhausted, subscription dropped");
                self.publish(SubscriptionStatus::Exhausted {
                    key: key.to_string(),
                    attempts: self.policy.max_attempts,
                });
            }
        }
    }

    /// Timer callback: reopen the channel if the key is still waiting on
    /// this generation's timer.
    fn retry(self: &Arc<Self>, key: &str, generation: u64) {
        let (next_generation, spec, replaced) = {
            let mut registry = self.registry.lock();
            let spec = match registry.entries.get_mut(key) {
                Some(entry)
                    if entry.generation == generation
                        && entry.state == SubscriptionState::BackoffWait =>
                {
                    entry.timer = None;
                    Arc::clone(&entry.spec)
                }
                _ => {
                    debug!(key, generation, "stale retry timer ignored");
                    return;
                }
            };
            let (next_generation, replaced) = registry.install(key, Arc::clone(&spec), true);
            (next_generation, spec, replaced)
        };

        if let Some(old) = replaced {
            self.release(old);
        }
        debug!(key, "resubscribing after backoff");
        self.connect(key, next_generation, &spec);
    }

    fn publish(&self, status: SubscriptionStatus) {
        let mut dropped = Vec::new();
        {
            let watchers = self.watchers.read();
            if watchers.is_empty() {
                return;
            }
            for watcher in watchers.iter() {
                if watcher.sender.try_send(status.clone()).is_err() {
                    dropped.push(watcher.id);
                }
            }
        }

        if !dropped.is_empty() {
            debug!(count = dropped.len(), "dropping slow status watchers");
            self.watchers.write().retain(|w| !dropped.contains(&w.id));
        }
    }
}

fn invoke(key: &str, callback: &MessageCallback, payload: &ChangePayload) {
    let outcome: std::thread::Result<std::result::Result<(), CallbackError>> =
        panic::catch_unwind(AssertUnwindSafe(|| (**callback)(payload)));

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(key, error = %e, "subscription callback failed");
        }
        Err(panic) => {
            warn!(key, panic = panic_message(&*panic), "subscription callback panicked");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Maintains exactly one live realtime subscription per logical key.
///
/// The manager is an owned value, normally one per user session. Channel
/// errors are retried with exponential backoff up to the policy's bound;
/// callbacks that fail are logged and never affect the channel. Dropping the
/// manager tears down every subscription.
pub struct SubscriptionManager {
    shared: Arc<Shared>,
}

impl SubscriptionManager {
    /// Create a manager with the default backoff policy.
    pub fn new(transport: Arc<dyn RealtimeTransport>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_policy(BackoffPolicy::default(), transport, scheduler)
    }

    /// Create a manager with a custom backoff policy.
    pub fn with_policy(
        policy: BackoffPolicy,
        transport: Arc<dyn RealtimeTransport>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self::build(policy, true, DEFAULT_STATUS_BUFFER, transport, scheduler)
    }

    /// Create a manager from a validated configuration.
    pub fn with_config(
        config: &RealtimeConfig,
        transport: Arc<dyn RealtimeTransport>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(
            config.backoff_policy(),
            config.verify_filters,
            config.status_buffer,
            transport,
            scheduler,
        ))
    }

    fn build(
        policy: BackoffPolicy,
        verify_filters: bool,
        status_buffer: usize,
        transport: Arc<dyn RealtimeTransport>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                watchers: RwLock::new(Vec::new()),
                next_watcher: AtomicU64::new(1),
                transport,
                scheduler,
                policy,
                verify_filters,
                status_buffer,
            }),
        }
    }

    /// Subscribe `callback` to changes on `resource` under `key`.
    ///
    /// An existing subscription under the same key is torn down first,
    /// including any pending retry. Only malformed arguments are errors;
    /// channel failures are retried in the background.
    pub fn subscribe<F>(
        &self,
        key: &str,
        resource: &str,
        callback: F,
        filter: Option<&str>,
        options: SubscribeOptions,
    ) -> Result<ChannelHandle>
    where
        F: Fn(&ChangePayload) -> std::result::Result<(), CallbackError> + Send + Sync + 'static,
    {
        if key.trim().is_empty() {
            return Err(RealtimeError::InvalidKey(key.to_string()));
        }
        if resource.trim().is_empty() {
            return Err(RealtimeError::InvalidResource(resource.to_string()));
        }
        let filter = filter.map(str::parse::<RowFilter>).transpose()?;

        let spec = Arc::new(SubscriptionSpec {
            resource: resource.to_string(),
            filter,
            scope: options.scope,
            verify_filter: options.verify_filter.unwrap_or(self.shared.verify_filters),
            callback: Arc::new(callback),
        });

        let (generation, replaced) = self
            .shared
            .registry
            .lock()
            .install(key, Arc::clone(&spec), false);

        if let Some(old) = replaced {
            debug!(key, "replacing existing subscription");
            self.shared.release(old);
        }

        Ok(self.shared.connect(key, generation, &spec))
    }

    /// Close the channel, cancel any pending retry and forget `key`.
    /// Unknown keys are a no-op.
    pub fn unsubscribe(&self, key: &str) {
        let removed = {
            let mut registry = self.shared.registry.lock();
            registry.retries.remove(key);
            registry.entries.remove(key)
        };

        if let Some(entry) = removed {
            self.shared.release(entry);
            debug!(key, "unsubscribed");
            self.shared.publish(SubscriptionStatus::Unsubscribed {
                key: key.to_string(),
            });
        }
    }

    /// Tear down every subscription (session logout).
    pub fn unsubscribe_all(&self) {
        let mut removed: Vec<(String, Entry)> = {
            let mut registry = self.shared.registry.lock();
            registry.retries.clear();
            registry.entries.drain().collect()
        };
        removed.sort_by(|a, b| a.0.cmp(&b.0));

        if !removed.is_empty() {
            info!(count = removed.len(), "unsubscribing all");
        }
        for (key, entry) in removed {
            self.shared.release(entry);
            self.shared
                .publish(SubscriptionStatus::Unsubscribed { key });
        }
    }

    /// Sorted snapshot of tracked keys, including those waiting to retry.
    pub fn active_subscriptions(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.shared.registry.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn is_subscribed(&self, key: &str) -> bool {
        self.shared.registry.lock().entries.contains_key(key)
    }

    pub fn state(&self, key: &str) -> Option<SubscriptionState> {
        self.shared.registry.lock().entries.get(key).map(|e| e.state)
    }

    /// Open channel for `key`, if any.
    pub fn channel(&self, key: &str) -> Option<ChannelHandle> {
        self.shared
            .registry
            .lock()
            .entries
            .get(key)
            .and_then(|e| e.channel)
    }

    /// Failed attempts recorded for `key` since its last healthy message.
    pub fn retry_attempts(&self, key: &str) -> u32 {
        self.shared
            .registry
            .lock()
            .retries
            .get(key)
            .map_or(0, |r| r.attempts)
    }

    pub fn len(&self) -> usize {
        self.shared.registry.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.shared.policy
    }

    /// Start receiving lifecycle status events.
    pub fn watch(&self) -> StatusHandle {
        let id = WatcherId(self.shared.next_watcher.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.shared.status_buffer);
        self.shared.watchers.write().push(Watcher { id, sender });
        StatusHandle { id, receiver }
    }

    pub fn unwatch(&self, id: WatcherId) {
        self.shared.watchers.write().retain(|w| w.id != id);
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use crate::transport::MemoryTransport;
    use crate::types::EventScope;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn setup() -> (SubscriptionManager, Arc<MemoryTransport>, Arc<ManualScheduler>) {
        let transport = Arc::new(MemoryTransport::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let manager = SubscriptionManager::new(transport.clone(), scheduler.clone());
        (manager, transport, scheduler)
    }

    fn counting(counter: &Arc<AtomicUsize>) -> impl Fn(&ChangePayload) -> std::result::Result<(), CallbackError> + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let (manager, transport, _) = setup();
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = manager
            .subscribe("orders_u1", "orders", counting(&counter), None, SubscribeOptions::default())
            .unwrap();
        assert_eq!(manager.active_subscriptions(), vec!["orders_u1".to_string()]);
        assert_eq!(manager.channel("orders_u1"), Some(handle));
        assert!(transport.is_open(handle));

        manager.unsubscribe("orders_u1");
        assert!(manager.is_empty());
        assert!(!transport.is_open(handle));

        // Idempotent
        manager.unsubscribe("orders_u1");
        manager.unsubscribe("never_seen");
        assert_eq!(transport.closed_total(), 1);
    }

    #[test]
    fn test_invalid_arguments() {
        let (manager, transport, _) = setup();
        let ok = |_: &ChangePayload| -> std::result::Result<(), CallbackError> { Ok(()) };

        assert!(matches!(
            manager.subscribe("", "orders", ok, None, SubscribeOptions::default()),
            Err(RealtimeError::InvalidKey(_))
        ));
        assert!(matches!(
            manager.subscribe("k", " ", ok, None, SubscribeOptions::default()),
            Err(RealtimeError::InvalidResource(_))
        ));
        assert!(matches!(
            manager.subscribe("k", "orders", ok, Some("user_id"), SubscribeOptions::default()),
            Err(RealtimeError::InvalidFilter(_))
        ));
        assert_eq!(transport.opened_total(), 0);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_resubscribe_replaces_channel() {
        let (manager, transport, _) = setup();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let h1 = manager
            .subscribe("cart_u1", "cart_items", counting(&first), None, SubscribeOptions::default())
            .unwrap();
        let h2 = manager
            .subscribe("cart_u1", "cart_items", counting(&second), None, SubscribeOptions::default())
            .unwrap();

        assert_ne!(h1, h2);
        assert!(!transport.is_open(h1));
        assert_eq!(transport.channels_for_topic("realtime:cart_u1"), vec![h2]);

        transport.emit(ChangePayload::insert("cart_items", json!({"id": 1})));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_schedule_and_exhaustion() {
        let (manager, transport, scheduler) = setup();
        manager
            .subscribe("orders_u1", "orders", |_: &ChangePayload| Ok(()), None, SubscribeOptions::default())
            .unwrap();

        for attempt in 1..=5u32 {
            let channel = manager.channel("orders_u1").unwrap();
            assert!(transport.fail_channel(channel, "network down"));
            assert_eq!(manager.state("orders_u1"), Some(SubscriptionState::BackoffWait));
            assert_eq!(manager.retry_attempts("orders_u1"), attempt);
            assert!(!transport.is_open(channel));

            assert!(scheduler.fire_next());
            assert_eq!(manager.state("orders_u1"), Some(SubscriptionState::Active));
        }

        let channel = manager.channel("orders_u1").unwrap();
        transport.fail_channel(channel, "network down");

        let delays: Vec<u64> = scheduler
            .scheduled_delays()
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
        assert!(!manager.is_subscribed("orders_u1"));
        assert_eq!(manager.retry_attempts("orders_u1"), 0);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(transport.open_count(), 0);
    }

    #[test]
    fn test_message_resets_retry_counter() {
        let (manager, transport, scheduler) = setup();
        let counter = Arc::new(AtomicUsize::new(0));
        manager
            .subscribe("notifications_u1", "notifications", counting(&counter), None, SubscribeOptions::default())
            .unwrap();

        for _ in 0..3 {
            transport.fail_resource("notifications", "timeout");
            scheduler.fire_next();
        }
        assert_eq!(manager.retry_attempts("notifications_u1"), 3);

        transport.emit(ChangePayload::insert("notifications", json!({"id": 9})));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(manager.retry_attempts("notifications_u1"), 0);

        transport.fail_resource("notifications", "timeout");
        assert_eq!(
            scheduler.scheduled_delays().last().copied(),
            Some(Duration::from_millis(1000))
        );
    }

    #[test]
    fn test_unsubscribe_cancels_pending_retry() {
        let (manager, transport, scheduler) = setup();
        manager
            .subscribe("properties", "properties", |_: &ChangePayload| Ok(()), None, SubscribeOptions::default())
            .unwrap();
        let channel = manager.channel("properties").unwrap();

        transport.fail_channel(channel, "closed");
        assert_eq!(scheduler.pending(), 1);

        manager.unsubscribe("properties");
        assert_eq!(scheduler.pending(), 0);

        scheduler.advance(Duration::from_secs(60));
        assert!(manager.is_empty());
        assert_eq!(transport.opened_total(), 1);
    }

    #[test]
    fn test_late_error_after_unsubscribe_is_ignored() {
        let (manager, transport, scheduler) = setup();
        let route_target = {
            manager
                .subscribe("cart_u1", "cart_items", |_: &ChangePayload| Ok(()), None, SubscribeOptions::default())
                .unwrap();
            Route {
                shared: Arc::downgrade(&manager.shared),
                key: "cart_u1".to_string(),
                generation: 1,
            }
        };

        manager.unsubscribe("cart_u1");
        route_target.on_error("late".to_string());
        route_target.on_message(ChangePayload::insert("cart_items", json!({})));

        assert!(manager.is_empty());
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(transport.opened_total(), 1);
    }

    #[test]
    fn test_callback_failures_do_not_break_channel() {
        let (manager, transport, _) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        manager
            .subscribe(
                "orders_u1",
                "orders",
                move |payload: &ChangePayload| {
                    let n = seen.fetch_add(1, Ordering::SeqCst);
                    match n {
                        0 => Err(format!("bad payload {:?}", payload.event_type).into()),
                        1 => panic!("handler bug"),
                        _ => Ok(()),
                    }
                },
                None,
                SubscribeOptions::default(),
            )
            .unwrap();

        for _ in 0..3 {
            transport.emit(ChangePayload::insert("orders", json!({"id": "o1"})));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(manager.state("orders_u1"), Some(SubscriptionState::Active));
    }

    #[test]
    fn test_event_scope_restricts_delivery() {
        let transport = Arc::new(MemoryTransport::without_server_filtering());
        let scheduler = Arc::new(ManualScheduler::new());
        let manager = SubscriptionManager::new(transport.clone(), scheduler);
        let counter = Arc::new(AtomicUsize::new(0));

        manager
            .subscribe(
                "notifications_u1",
                "notifications",
                counting(&counter),
                None,
                SubscribeOptions::scope(EventScope::Insert),
            )
            .unwrap();

        transport.emit(ChangePayload::insert("notifications", json!({"id": 1})));
        transport.emit(ChangePayload::update("notifications", json!({"id": 1}), json!({"id": 1, "read": true})));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejected_open_enters_backoff() {
        let (manager, transport, scheduler) = setup();
        transport.reject_next_opens(1);

        let handle = manager
            .subscribe("orders_u1", "orders", |_: &ChangePayload| Ok(()), None, SubscribeOptions::default())
            .unwrap();

        assert!(!transport.is_open(handle));
        assert_eq!(manager.state("orders_u1"), Some(SubscriptionState::BackoffWait));
        assert_eq!(manager.channel("orders_u1"), None);

        scheduler.advance(Duration::from_millis(1000));
        assert_eq!(manager.state("orders_u1"), Some(SubscriptionState::Active));
        assert_eq!(transport.open_count(), 1);
    }

    #[test]
    fn test_watch_reports_lifecycle() {
        let (manager, transport, scheduler) = setup();
        let status = manager.watch();

        let handle = manager
            .subscribe("orders_u1", "orders", |_: &ChangePayload| Ok(()), None, SubscribeOptions::default())
            .unwrap();
        transport.fail_channel(handle, "boom");
        scheduler.fire_next();
        manager.unsubscribe("orders_u1");

        let events = status.drain();
        assert!(matches!(events[0], SubscriptionStatus::Subscribed { ref key, channel } if key == "orders_u1" && channel == handle));
        assert!(matches!(events[1], SubscriptionStatus::ChannelError { ref reason, .. } if reason == "boom"));
        assert!(matches!(
            events[2],
            SubscriptionStatus::RetryScheduled { attempt: 1, delay, .. } if delay == Duration::from_millis(1000)
        ));
        assert!(matches!(events[3], SubscriptionStatus::Subscribed { .. }));
        assert!(matches!(events[4], SubscriptionStatus::Unsubscribed { .. }));
        assert_eq!(events.len(), 5);

        manager.unwatch(status.id);
        manager
            .subscribe("orders_u1", "orders", |_: &ChangePayload| Ok(()), None, SubscribeOptions::default())
            .unwrap();
        assert!(status.try_recv().is_err());
    }

    #[test]
    fn test_drop_closes_channels() {
        let (manager, transport, scheduler) = setup();
        manager
            .subscribe("a", "orders", |_: &ChangePayload| Ok(()), None, SubscribeOptions::default())
            .unwrap();
        let b = manager
            .subscribe("b", "cart_items", |_: &ChangePayload| Ok(()), None, SubscribeOptions::default())
            .unwrap();
        transport.fail_channel(b, "x");

        drop(manager);
        assert_eq!(transport.open_count(), 0);
        assert_eq!(scheduler.pending(), 0);
    }
}
