//! Boundary to the device position stream.
//!
//! The engine never polls a GPS itself. A host implements [`PositionSource`]
//! over whatever location API it has, and sessions receive fixes through a
//! [`PositionListener`]. [`SessionFeed`] adapts any recorder or tracker into a
//! listener that delivers fixes one at a time under a lock, so a session is
//! never mutated re-entrantly.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{GeoPoint, Rejection};

/// A single position report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct PositionFix {
    pub point: GeoPoint,
    /// Reported horizontal accuracy. Carried for the host, not used by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_meters: Option<f64>,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl PositionFix {
    pub fn new(point: GeoPoint, timestamp_ms: i64) -> Self {
        Self {
            point,
            accuracy_meters: None,
            timestamp_ms,
        }
    }

    pub fn with_accuracy(mut self, meters: f64) -> Self {
        self.accuracy_meters = Some(meters);
        self
    }
}

/// Handle returned by [`PositionSource::subscribe`].
pub type SubscriptionId = u64;

/// Receives position updates in arrival order.
pub trait PositionListener: Send + Sync {
    fn on_position(&self, fix: PositionFix);

    /// The source failed; the subscription may be retried.
    fn on_error(&self, _error: Rejection) {}
}

/// Something that can stream positions to listeners.
pub trait PositionSource {
    fn subscribe(&self, listener: Arc<dyn PositionListener>) -> Result<SubscriptionId, Rejection>;

    /// Stop delivery. No callback for `id` may run after this returns.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// A session that consumes fixes and produces events.
pub trait FixHandler {
    type Event;

    fn handle_fix(&mut self, fix: &PositionFix) -> Vec<Self::Event>;
}

type EventSink<E> = Box<dyn Fn(E) + Send + Sync>;

/// Bridges a [`PositionSource`] to a single session.
///
/// Events produced by the session are forwarded to `sink`. After
/// [`detach`](Self::detach) incoming fixes are discarded.
pub struct SessionFeed<H: FixHandler> {
    handler: Mutex<H>,
    sink: EventSink<H::Event>,
    detached: AtomicBool,
}

impl<H> SessionFeed<H>
where
    H: FixHandler + Send,
{
    pub fn new(handler: H, sink: impl Fn(H::Event) + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Mutex::new(handler),
            sink: Box::new(sink),
            detached: AtomicBool::new(false),
        })
    }

    /// Run a user action against the session (pause, resume, finish, ...).
    pub fn with_session<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        let mut guard = self.handler.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

impl<H> PositionListener for SessionFeed<H>
where
    H: FixHandler + Send,
{
    fn on_position(&self, fix: PositionFix) {
        if self.is_detached() {
            return;
        }
        let events = self.with_session(|session| session.handle_fix(&fix));
        for event in events {
            (self.sink)(event);
        }
    }

    fn on_error(&self, error: Rejection) {
        debug!("[PositionSource] Listener notified of failure: {}", error);
    }
}

/// In-process source that replays a scripted sequence of fixes.
///
/// Used by tests and demos in place of a device location service.
#[derive(Default)]
pub struct ReplaySource {
    listeners: Mutex<Vec<(SubscriptionId, Arc<dyn PositionListener>)>>,
    next_id: AtomicU64,
    unavailable: AtomicBool,
}

impl ReplaySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent subscriptions fail, as when location permission is denied.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Deliver one fix to every current subscriber.
    pub fn emit(&self, fix: PositionFix) {
        // Snapshot so listeners may unsubscribe from inside a callback.
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener.on_position(fix);
        }
    }

    pub fn replay(&self, fixes: impl IntoIterator<Item = PositionFix>) {
        for fix in fixes {
            self.emit(fix);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl PositionSource for ReplaySource {
    fn subscribe(&self, listener: Arc<dyn PositionListener>) -> Result<SubscriptionId, Rejection> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Rejection::ExternalFailure("position source unavailable".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));
        info!("[PositionSource] Subscribed listener {}", id);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(existing, _)| *existing != id);
        info!("[PositionSource] Unsubscribed listener {}", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        seen: u32,
    }

    impl FixHandler for Counter {
        type Event = u32;

        fn handle_fix(&mut self, _fix: &PositionFix) -> Vec<u32> {
            self.seen += 1;
            vec![self.seen]
        }
    }

    fn fix(ms: i64) -> PositionFix {
        PositionFix::new(GeoPoint::new(0.0, 0.0), ms)
    }

    #[test]
    fn test_feed_forwards_events() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let feed = SessionFeed::new(Counter { seen: 0 }, move |e| sink.lock().unwrap().push(e));

        let source = ReplaySource::new();
        source.subscribe(feed.clone()).unwrap();
        source.replay([fix(0), fix(1000), fix(2000)]);

        assert_eq!(*received.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(feed.with_session(|c| c.seen), 3);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let feed = SessionFeed::new(Counter { seen: 0 }, |_| {});
        let source = ReplaySource::new();
        let id = source.subscribe(feed.clone()).unwrap();

        source.emit(fix(0));
        source.unsubscribe(id);
        source.emit(fix(1000));

        assert_eq!(source.subscriber_count(), 0);
        assert_eq!(feed.with_session(|c| c.seen), 1);
    }

    #[test]
    fn test_detached_feed_ignores_fixes() {
        let feed = SessionFeed::new(Counter { seen: 0 }, |_| {});
        feed.detach();
        feed.on_position(fix(0));
        assert_eq!(feed.with_session(|c| c.seen), 0);
    }

    #[test]
    fn test_unavailable_source() {
        let source = ReplaySource::new();
        source.set_unavailable(true);
        let feed = SessionFeed::new(Counter { seen: 0 }, |_| {});
        assert!(matches!(source.subscribe(feed), Err(Rejection::ExternalFailure(_))));
    }
}
