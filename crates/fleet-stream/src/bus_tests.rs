use super::*;
use fleet_core::SystemClock;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn bus() -> EventBus {
    EventBus::new(Arc::new(SystemClock), MetricsRegistry::new())
}

#[tokio::test]
async fn a_subscriber_receives_events_on_its_topic() {
    let bus = bus();
    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();
    bus.subscribe("progress", move |event: BusEvent| {
        let received = received_clone.clone();
        async move {
            received.lock().push(event.payload);
        }
    });

    bus.publish(BusEvent::new("progress", json!({"n": 1})));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(*received.lock(), vec![json!({"n": 1})]);
}

#[tokio::test]
async fn a_wildcard_subscriber_receives_every_topic() {
    let bus = bus();
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    bus.subscribe("", move |_event: BusEvent| {
        let count = count_clone.clone();
        async move {
            count.fetch_add(1, Ordering::Relaxed);
        }
    });

    bus.publish(BusEvent::new("a", json!(1)));
    bus.publish(BusEvent::new("b", json!(2)));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(count.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn unsubscribe_stops_further_delivery() {
    let bus = bus();
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    let id = bus.subscribe("x", move |_event: BusEvent| {
        let count = count_clone.clone();
        async move {
            count.fetch_add(1, Ordering::Relaxed);
        }
    });

    bus.publish(BusEvent::new("x", json!(1)));
    tokio::time::sleep(Duration::from_millis(20)).await;
    bus.unsubscribe(id);
    bus.publish(BusEvent::new("x", json!(2)));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(count.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn published_events_are_stamped_with_a_timestamp_if_unset() {
    let bus = bus();
    let seen = Arc::new(Mutex::new(None));
    let seen_clone = seen.clone();
    bus.subscribe("t", move |event: BusEvent| {
        let seen = seen_clone.clone();
        async move {
            *seen.lock() = event.published_at_ms;
        }
    });
    bus.publish(BusEvent::new("t", json!(1)));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(seen.lock().is_some());
}

#[test]
fn overflow_drops_the_oldest_queued_event() {
    let backlog = Backlog::new(2);
    assert!(!backlog.push(BusEvent::new("t", json!(1))));
    assert!(!backlog.push(BusEvent::new("t", json!(2))));
    assert!(backlog.push(BusEvent::new("t", json!(3))), "third push should evict the oldest");
    assert_eq!(backlog.pop().unwrap().payload, json!(2));
    assert_eq!(backlog.pop().unwrap().payload, json!(3));
}
