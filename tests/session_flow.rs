//! End-to-end session tests: services, event bus and logout.

use estate_realtime::services::{cart, notifications, orders, properties};
use estate_realtime::{
    AppEvent, CartAction, ChangePayload, EventBus, ManualScheduler, MemoryTransport,
    RealtimeConfig, RealtimeError, RealtimeSession, SubscriptionManager, Topic,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn start(user: &str) -> (RealtimeSession, Arc<MemoryTransport>, Arc<ManualScheduler>) {
    let transport = Arc::new(MemoryTransport::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let session = RealtimeSession::start(
        &RealtimeConfig::default(),
        transport.clone(),
        scheduler.clone(),
        user,
    )
    .unwrap();
    (session, transport, scheduler)
}

#[test]
fn test_session_subscribes_standard_feeds() {
    let (session, transport, _) = start("u1");

    assert_eq!(
        session.manager().active_subscriptions(),
        vec!["cart_u1", "notifications_u1", "orders_u1", "properties"]
    );
    assert_eq!(transport.open_count(), 4);

    let orders_channel = session.manager().channel("orders_u1").unwrap();
    let request = transport.request(orders_channel).unwrap();
    assert_eq!(request.topic, "realtime:orders_u1");
    assert_eq!(request.resource, "orders");
    assert_eq!(request.filter.unwrap().to_string(), "user_id=eq.u1");
}

#[test]
fn test_order_events_reach_bus() {
    let (session, transport, _) = start("u1");
    let rx = session.bus().channel("order:*", 16);

    transport.emit(ChangePayload::insert(
        "orders",
        json!({"id": "o1", "user_id": "u1", "status": "pending"}),
    ));
    transport.emit(ChangePayload::update(
        "orders",
        json!({"id": "o1", "user_id": "u1", "status": "pending"}),
        json!({"id": "o1", "user_id": "u1", "status": "paid"}),
    ));
    // Another user's order never arrives
    transport.emit(ChangePayload::insert(
        "orders",
        json!({"id": "o9", "user_id": "u2", "status": "pending"}),
    ));

    let events = rx.drain();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].name(), "order:created");
    match &events[1] {
        AppEvent::OrderStatusChanged {
            order_id,
            old_status,
            new_status,
            ..
        } => {
            assert_eq!(order_id, "o1");
            assert_eq!(old_status.as_deref(), Some("pending"));
            assert_eq!(new_status, "paid");
        }
        other => panic!("Expected order:status_changed, got {:?}", other),
    }
}

#[test]
fn test_foreign_rows_dropped_without_server_filter() {
    let transport = Arc::new(MemoryTransport::without_server_filtering());
    let scheduler = Arc::new(ManualScheduler::new());
    let session = RealtimeSession::start(
        &RealtimeConfig::default(),
        transport.clone(),
        scheduler,
        "u1",
    )
    .unwrap();
    let rx = session.bus().channel(Topic::All, 16);

    transport.emit(ChangePayload::insert(
        "notifications",
        json!({"id": 1, "user_id": "u2", "message": "not yours"}),
    ));
    transport.emit(ChangePayload::insert(
        "cart_items",
        json!({"id": 5, "user_id": "u2"}),
    ));
    assert!(rx.drain().is_empty());

    transport.emit(ChangePayload::insert(
        "notifications",
        json!({"id": 2, "user_id": "u1", "message": "Viewing confirmed"}),
    ));
    let events = rx.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name(), "notification:received");
}

#[test]
fn test_cart_and_property_events() {
    let (session, transport, _) = start("u1");
    let rx = session.bus().channel(Topic::All, 16);

    transport.emit(ChangePayload::insert(
        "cart_items",
        json!({"id": 1, "user_id": "u1", "property_id": "p1"}),
    ));
    transport.emit(ChangePayload::delete(
        "cart_items",
        json!({"id": 1, "user_id": "u1"}),
    ));
    transport.emit(ChangePayload::update(
        "properties",
        json!({"id": "p1", "status": "available"}),
        json!({"id": "p1", "status": "reserved"}),
    ));

    let names: Vec<&str> = rx.drain().iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        vec!["cart:updated", "cart:updated", "property:status_changed"]
    );
}

#[test]
fn test_watch_property_listing() {
    let (session, transport, _) = start("u1");
    session.watch_property("p7").unwrap();
    assert!(session.manager().is_subscribed("property_p7"));

    let rx = session.bus().channel("property:deleted", 4);
    transport.emit(ChangePayload::delete("properties", json!({"id": "p7"})));

    // Catalogue feed and the listing feed both see it
    assert_eq!(rx.drain().len(), 2);

    session.unwatch_property("p7").unwrap();
    assert!(!session.manager().is_subscribed("property_p7"));
    assert!(matches!(
        session.watch_property(""),
        Err(RealtimeError::InvalidKey(_))
    ));
}

#[test]
fn test_feed_recovers_after_outage() {
    let (session, transport, scheduler) = start("u1");
    let rx = session.bus().channel("notification:received", 4);

    assert_eq!(transport.fail_resource("notifications", "network"), 1);
    assert!(session.manager().channel("notifications_u1").is_none());

    scheduler.advance(Duration::from_millis(1000));
    transport.emit(ChangePayload::insert(
        "notifications",
        json!({"id": 3, "user_id": "u1"}),
    ));
    assert_eq!(rx.drain().len(), 1);
    assert_eq!(session.manager().retry_attempts("notifications_u1"), 0);
}

#[test]
fn test_logout_tears_everything_down() {
    let (session, transport, scheduler) = start("u1");
    let orders_rx = session.bus().channel("order:*", 4);
    transport.fail_resource("cart_items", "network");
    assert_eq!(scheduler.pending(), 1);

    session.logout();

    assert_eq!(transport.open_count(), 0);
    assert_eq!(scheduler.pending(), 0);
    scheduler.advance(Duration::from_secs(60));
    assert_eq!(transport.open_count(), 0);

    transport.emit(ChangePayload::insert("orders", json!({"id": "o1", "user_id": "u1"})));
    assert!(orders_rx.try_recv().is_err());
}

#[test]
fn test_session_rejects_blank_user() {
    let transport = Arc::new(MemoryTransport::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let result = RealtimeSession::start(&RealtimeConfig::default(), transport.clone(), scheduler, " ");
    assert!(matches!(result, Err(RealtimeError::InvalidKey(_))));
    assert_eq!(transport.opened_total(), 0);
}

#[test]
fn test_services_on_shared_manager() {
    // Wrappers can be used without a session, e.g. for an admin dashboard.
    let transport = Arc::new(MemoryTransport::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let manager = SubscriptionManager::new(transport.clone(), scheduler);
    let bus = Arc::new(EventBus::new());

    orders::subscribe(&manager, &bus, "seller-3").unwrap();
    cart::subscribe(&manager, &bus, "seller-3").unwrap();
    notifications::subscribe(&manager, &bus, "seller-3").unwrap();
    properties::subscribe_all(&manager, &bus).unwrap();
    // Repeat subscription replaces rather than stacks
    orders::subscribe(&manager, &bus, "seller-3").unwrap();

    assert_eq!(manager.len(), 4);
    assert_eq!(transport.open_count(), 4);

    let rx = bus.channel("cart:updated", 4);
    transport.emit(ChangePayload::update(
        "cart_items",
        json!({"id": 2}),
        json!({"id": 2, "user_id": "seller-3", "quantity": 1}),
    ));
    assert!(matches!(
        rx.try_recv(),
        Ok(AppEvent::CartUpdated { action: CartAction::Updated, .. })
    ));
}
