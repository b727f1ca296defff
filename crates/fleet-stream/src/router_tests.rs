use super::*;
use fleet_core::Envelope;
use parking_lot::Mutex as PMutex;
use std::sync::Arc;

struct RecordingHandler {
    name: &'static str,
    fails: bool,
    seen: Arc<PMutex<Vec<&'static str>>>,
}

#[async_trait]
impl Handler for RecordingHandler {
    async fn handle(&self, _envelope: &Envelope) -> Result<(), StreamError> {
        self.seen.lock().push(self.name);
        if self.fails {
            Err(StreamError::HandlerFailed(self.name.to_string()))
        } else {
            Ok(())
        }
    }
}

struct PanicsHandler;

#[async_trait]
impl Handler for PanicsHandler {
    async fn handle(&self, _envelope: &Envelope) -> Result<(), StreamError> {
        panic!("handler exploded");
    }
}

#[tokio::test]
async fn handlers_fire_in_descending_priority_order() {
    let seen = Arc::new(PMutex::new(Vec::new()));
    let router = MessageRouter::new(MetricsRegistry::new());
    router.register(Tag::Text, 1, Arc::new(RecordingHandler { name: "low", fails: false, seen: seen.clone() }));
    router.register(Tag::Text, 10, Arc::new(RecordingHandler { name: "high", fails: false, seen: seen.clone() }));

    router.route_sync(Envelope::new(Tag::Text, "hi")).await.unwrap();
    assert_eq!(*seen.lock(), vec!["high", "low"]);
}

#[tokio::test]
async fn a_failing_handler_does_not_stop_the_others_but_is_reported() {
    let seen = Arc::new(PMutex::new(Vec::new()));
    let router = MessageRouter::new(MetricsRegistry::new());
    router.register(Tag::Text, 10, Arc::new(RecordingHandler { name: "a", fails: true, seen: seen.clone() }));
    router.register(Tag::Text, 5, Arc::new(RecordingHandler { name: "b", fails: false, seen: seen.clone() }));

    let err = router.route_sync(Envelope::new(Tag::Text, "hi")).await.unwrap_err();
    assert!(matches!(err, StreamError::HandlerFailed(_)));
    assert_eq!(*seen.lock(), vec!["a", "b"]);
}

#[tokio::test]
async fn unregistered_tag_falls_back_to_the_default_handler() {
    let seen = Arc::new(PMutex::new(Vec::new()));
    let router = MessageRouter::new(MetricsRegistry::new());
    router.set_fallback(Arc::new(RecordingHandler { name: "fallback", fails: false, seen: seen.clone() }));

    router.route_sync(Envelope::new(Tag::System, "boot")).await.unwrap();
    assert_eq!(*seen.lock(), vec!["fallback"]);
}

#[tokio::test]
async fn a_panicking_handler_surfaces_as_an_error_without_breaking_the_router() {
    let router = MessageRouter::new(MetricsRegistry::new());
    router.register(Tag::Error, 0, Arc::new(PanicsHandler));
    let err = router.route_sync(Envelope::new(Tag::Error, "boom")).await.unwrap_err();
    assert!(matches!(err, StreamError::HandlerPanicked(_)));
}

#[tokio::test]
async fn error_callback_is_invoked_per_failure() {
    let calls = Arc::new(PMutex::new(0));
    let router = MessageRouter::new(MetricsRegistry::new());
    router.register(Tag::Text, 0, Arc::new(RecordingHandler { name: "a", fails: true, seen: Arc::new(PMutex::new(Vec::new())) }));
    let calls_clone = calls.clone();
    router.on_error(Arc::new(move |_tag, _err| {
        *calls_clone.lock() += 1;
    }));
    let _ = router.route_sync(Envelope::new(Tag::Text, "hi")).await;
    assert_eq!(*calls.lock(), 1);
}
