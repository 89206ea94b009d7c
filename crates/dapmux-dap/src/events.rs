//! Event processing for a single DAP connection.
//!
//! Keeps the last event of each type, derived stop state, per-type
//! subscribers (invoked in registration order) and one-shot waiters.
//! Handlers run synchronously on the inbound task and must not block.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::protocol::{Event, StopReason, StoppedEventBody};

/// Callback invoked for every delivered event of a subscribed type.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Hook consulted before an event is delivered.
pub type EventInterceptor = Arc<dyn Fn(&Event) -> Dispatch + Send + Sync>;

/// Verdict of an [`EventInterceptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Deliver normally.
    Deliver,
    /// Drop before caching, subscribers and waiters see it.
    Suppress,
}

/// Handle returned by [`EventProcessor::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Result of waiting for an event.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// The awaited event arrived.
    Event(Event),
    /// The bound elapsed first.
    TimedOut,
    /// The processor went away without delivering.
    Closed,
}

impl WaitOutcome {
    /// The event, if one arrived.
    pub fn into_event(self) -> Option<Event> {
        match self {
            WaitOutcome::Event(event) => Some(event),
            WaitOutcome::TimedOut | WaitOutcome::Closed => None,
        }
    }
}

/// A one-shot wait armed for one or more event types.
///
/// Arm it before sending the request whose effect it observes; the
/// first matching event after arming satisfies it.
#[derive(Debug)]
pub struct EventWaiter {
    rx: oneshot::Receiver<Event>,
}

impl EventWaiter {
    /// Suspend until the event arrives or `timeout` elapses.
    pub async fn wait(self, timeout: Duration) -> WaitOutcome {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(event)) => WaitOutcome::Event(event),
            Ok(Err(_)) => WaitOutcome::Closed,
            Err(_) => WaitOutcome::TimedOut,
        }
    }
}

struct Subscriber {
    id: SubscriptionId,
    event_type: String,
    handler: EventHandler,
}

struct Waiter {
    event_types: Vec<String>,
    tx: oneshot::Sender<Event>,
}

#[derive(Default)]
struct ProcessorState {
    last_events: HashMap<String, Event>,
    subscribers: Vec<Subscriber>,
    waiters: Vec<Waiter>,
    interceptor: Option<EventInterceptor>,
    current_thread_id: Option<i64>,
    stop_reason: Option<StopReason>,
    next_subscription: u64,
    closed: bool,
}

/// Dispatches adapter events and tracks derived stop state.
#[derive(Default)]
pub struct EventProcessor {
    state: Mutex<ProcessorState>,
}

impl EventProcessor {
    /// Create an empty processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `event_type`.
    pub fn subscribe(&self, event_type: &str, handler: EventHandler) -> SubscriptionId {
        let mut state = self.state.lock();
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        state.subscribers.push(Subscriber {
            id,
            event_type: event_type.to_string(),
            handler,
        });
        id
    }

    /// Remove a subscription. Returns `true` if it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|s| s.id != id);
        state.subscribers.len() != before
    }

    /// Number of live subscriptions for `event_type`.
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.state
            .lock()
            .subscribers
            .iter()
            .filter(|s| s.event_type == event_type)
            .count()
    }

    /// Install (or clear) the pre-delivery hook.
    pub fn set_interceptor(&self, interceptor: Option<EventInterceptor>) {
        self.state.lock().interceptor = interceptor;
    }

    /// Process one inbound event.
    pub fn process_event(&self, event: Event) {
        let interceptor = self.state.lock().interceptor.clone();
        if let Some(intercept) = interceptor {
            if intercept(&event) == Dispatch::Suppress {
                tracing::debug!(event = %event.event, seq = event.seq, "event suppressed");
                return;
            }
        }

        let (handlers, waiters) = {
            let mut state = self.state.lock();
            state.last_events.insert(event.event.clone(), event.clone());
            match event.event.as_str() {
                "stopped" => {
                    if let Ok(body) = event.parse_body::<StoppedEventBody>() {
                        if body.thread_id.is_some() {
                            state.current_thread_id = body.thread_id;
                        }
                        state.stop_reason = Some(body.reason);
                    }
                }
                "continued" => state.stop_reason = None,
                _ => {}
            }

            let handlers: Vec<EventHandler> = state
                .subscribers
                .iter()
                .filter(|s| s.event_type == event.event)
                .map(|s| s.handler.clone())
                .collect();

            let (matched, pending): (Vec<Waiter>, Vec<Waiter>) = std::mem::take(&mut state.waiters)
                .into_iter()
                .filter(|w| !w.tx.is_closed())
                .partition(|w| w.event_types.iter().any(|t| *t == event.event));
            state.waiters = pending;
            (handlers, matched)
        };

        // The lock is released so handlers may subscribe or unsubscribe.
        for handler in handlers {
            handler(&event);
        }
        for waiter in waiters {
            let _ = waiter.tx.send(event.clone());
        }
    }

    /// Arm a one-shot wait for the first of `event_types`.
    pub fn arm(&self, event_types: &[&str]) -> EventWaiter {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();
        if state.closed {
            // Dropping `tx` makes the wait resolve as Closed immediately.
            return EventWaiter { rx };
        }
        state.waiters.push(Waiter {
            event_types: event_types.iter().map(|t| t.to_string()).collect(),
            tx,
        });
        EventWaiter { rx }
    }

    /// Arm and await a single event type.
    pub async fn wait_for_event(&self, event_type: &str, timeout: Duration) -> WaitOutcome {
        self.arm(&[event_type]).wait(timeout).await
    }

    /// Treat the connection as gone: deliver a synthetic `terminated`
    /// (unless the adapter already sent one) and release every waiter.
    pub fn mark_closed(&self) {
        let already_terminated = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.last_events.contains_key("terminated")
        };
        if !already_terminated {
            self.process_event(Event::new(0, "terminated", None));
        }
        self.state.lock().waiters.clear();
    }

    /// Whether [`mark_closed`](Self::mark_closed) has run.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Most recent event of the given type.
    pub fn last_event(&self, event_type: &str) -> Option<Event> {
        self.state.lock().last_events.get(event_type).cloned()
    }

    /// Thread id reported by the most recent `stopped` event.
    pub fn current_thread_id(&self) -> Option<i64> {
        self.state.lock().current_thread_id
    }

    /// Stop reason of the most recent `stopped` event, cleared on `continued`.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.state.lock().stop_reason.clone()
    }
}

impl std::fmt::Debug for EventProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventProcessor")
            .field("subscribers", &state.subscribers.len())
            .field("waiters", &state.waiters.len())
            .field("current_thread_id", &state.current_thread_id)
            .field("stop_reason", &state.stop_reason)
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn stopped(thread_id: i64, reason: &str) -> Event {
        Event::new(
            1,
            "stopped",
            Some(serde_json::json!({"reason": reason, "threadId": thread_id})),
        )
    }

    #[test]
    fn subscribers_run_in_registration_order() {
        let processor = EventProcessor::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let log = log.clone();
            processor.subscribe(
                "stopped",
                Arc::new(move |_: &Event| log.lock().push(name)),
            );
        }
        processor.process_event(stopped(1, "breakpoint"));
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn late_subscribers_get_no_replay() {
        let processor = EventProcessor::new();
        let early = Arc::new(AtomicUsize::new(0));
        let late = Arc::new(AtomicUsize::new(0));

        let counter = early.clone();
        processor.subscribe(
            "stopped",
            Arc::new(move |_: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        processor.process_event(stopped(1, "step"));

        let counter = late.clone();
        processor.subscribe(
            "stopped",
            Arc::new(move |_: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(early.load(Ordering::SeqCst), 1);
        assert_eq!(late.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscribers_only_see_their_type() {
        let processor = EventProcessor::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        processor.subscribe(
            "output",
            Arc::new(move |_: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        processor.process_event(stopped(1, "step"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(processor.subscriber_count("output"), 1);
        assert_eq!(processor.subscriber_count("stopped"), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let processor = EventProcessor::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let id = processor.subscribe(
            "stopped",
            Arc::new(move |_: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(processor.unsubscribe(id));
        assert!(!processor.unsubscribe(id));
        processor.process_event(stopped(1, "step"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_may_subscribe_during_dispatch() {
        let processor = Arc::new(EventProcessor::new());
        let inner = processor.clone();
        processor.subscribe(
            "stopped",
            Arc::new(move |_: &Event| {
                inner.subscribe("continued", Arc::new(|_: &Event| {}));
            }),
        );
        processor.process_event(stopped(1, "step"));
        assert_eq!(processor.subscriber_count("continued"), 1);
    }

    #[test]
    fn stopped_updates_derived_state() {
        let processor = EventProcessor::new();
        processor.process_event(stopped(7, "breakpoint"));
        assert_eq!(processor.current_thread_id(), Some(7));
        assert_eq!(processor.stop_reason(), Some(StopReason::Breakpoint));
        assert_eq!(
            processor.last_event("stopped").unwrap().body.unwrap()["threadId"],
            7
        );

        processor.process_event(Event::new(
            2,
            "continued",
            Some(serde_json::json!({"threadId": 7})),
        ));
        assert_eq!(processor.stop_reason(), None);
        assert_eq!(processor.current_thread_id(), Some(7));
    }

    #[test]
    fn interceptor_can_suppress() {
        let processor = EventProcessor::new();
        processor.set_interceptor(Some(Arc::new(|e: &Event| {
            if e.event == "stopped" {
                Dispatch::Suppress
            } else {
                Dispatch::Deliver
            }
        })));
        processor.process_event(stopped(1, "breakpoint"));
        assert!(processor.last_event("stopped").is_none());
        assert_eq!(processor.current_thread_id(), None);
    }

    #[tokio::test]
    async fn waiter_is_satisfied_once() {
        let processor = EventProcessor::new();
        let waiter = processor.arm(&["stopped", "terminated"]);
        processor.process_event(stopped(3, "step"));
        match waiter.wait(Duration::from_millis(100)).await {
            WaitOutcome::Event(e) => assert_eq!(e.event, "stopped"),
            other => panic!("expected event, got {other:?}"),
        }

        // A waiter armed after the event does not see it.
        let late = processor.arm(&["stopped"]);
        assert_eq!(
            late.wait(Duration::from_millis(20)).await,
            WaitOutcome::TimedOut
        );
    }

    #[tokio::test]
    async fn waiter_matches_any_of_its_types() {
        let processor = EventProcessor::new();
        let waiter = processor.arm(&["stopped", "terminated"]);
        processor.process_event(Event::new(5, "terminated", None));
        let event = waiter
            .wait(Duration::from_millis(100))
            .await
            .into_event()
            .unwrap();
        assert_eq!(event.event, "terminated");
    }

    #[tokio::test]
    async fn wait_for_event_times_out() {
        let processor = EventProcessor::new();
        let outcome = processor
            .wait_for_event("stopped", Duration::from_millis(10))
            .await;
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[tokio::test]
    async fn mark_closed_synthesizes_terminated() {
        let processor = EventProcessor::new();
        let waiter = processor.arm(&["terminated"]);
        let other = processor.arm(&["stopped"]);
        processor.mark_closed();

        assert!(processor.is_closed());
        assert!(processor.last_event("terminated").is_some());
        assert!(matches!(
            waiter.wait(Duration::from_millis(50)).await,
            WaitOutcome::Event(_)
        ));
        assert_eq!(
            other.wait(Duration::from_millis(50)).await,
            WaitOutcome::Closed
        );
        assert_eq!(
            processor.arm(&["stopped"]).wait(Duration::from_millis(50)).await,
            WaitOutcome::Closed
        );
    }
}
