//! Forwards run-state events from a parent session to its children.
//!
//! A JavaScript debug target may spawn sub-processes, each on its own
//! adapter connection. The bridge replays a parent's `stopped` and
//! `continued` events into every linked child so their state follows the
//! parent without the caller polling each child.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use dapmux_dap::{Event, EventProcessor, SubscriptionId};
use parking_lot::Mutex;

use crate::session::Session;

/// Event types copied from a parent to its children.
pub const FORWARDED_EVENTS: &[&str] = &["stopped", "continued"];

/// Body fields that name objects on the parent's connection.
const PARENT_ONLY_FIELDS: &[&str] = &["threadId", "hitBreakpointIds"];

/// The copy of a parent event a child receives. Thread and breakpoint ids
/// are dropped so the child keeps resolving its own.
fn child_copy(event: &Event) -> Event {
    let mut copy = event.clone();
    if let Some(serde_json::Value::Object(body)) = copy.body.as_mut() {
        for field in PARENT_ONLY_FIELDS {
            body.remove(*field);
        }
    }
    copy
}

struct ParentSubscription {
    events: Arc<EventProcessor>,
    ids: Vec<SubscriptionId>,
}

#[derive(Default)]
struct BridgeState {
    /// parent id -> children in link order.
    children: HashMap<String, Vec<(String, Weak<Session>)>>,
    /// child id -> parent id.
    parents: HashMap<String, String>,
    subscriptions: HashMap<String, ParentSubscription>,
}

/// Parent-to-child event forwarding.
#[derive(Default)]
pub struct EventBridge {
    state: Mutex<BridgeState>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `child` under `parent_id`. Relinking moves the child.
    pub fn link(&self, parent_id: &str, child: &Arc<Session>) {
        let child_id = child.id().to_string();
        let mut state = self.state.lock();
        if let Some(old) = state.parents.insert(child_id.clone(), parent_id.to_string()) {
            if let Some(siblings) = state.children.get_mut(&old) {
                siblings.retain(|(id, _)| *id != child_id);
            }
        }
        state
            .children
            .entry(parent_id.to_string())
            .or_default()
            .push((child_id, Arc::downgrade(child)));
    }

    /// Forget `child_id`. Returns its former parent.
    pub fn unlink_child(&self, child_id: &str) -> Option<String> {
        let mut state = self.state.lock();
        let parent = state.parents.remove(child_id)?;
        if let Some(siblings) = state.children.get_mut(&parent) {
            siblings.retain(|(id, _)| id != child_id);
            if siblings.is_empty() {
                state.children.remove(&parent);
            }
        }
        Some(parent)
    }

    /// Start forwarding `parent`'s events. Returns `false` when already
    /// forwarding, so repeated calls never double-deliver.
    pub fn subscribe_parent(self: &Arc<Self>, parent: &Arc<Session>) -> bool {
        let parent_id = parent.id().to_string();
        let mut state = self.state.lock();
        if state.subscriptions.contains_key(&parent_id) {
            return false;
        }

        let events = parent.client().events().clone();
        let ids = FORWARDED_EVENTS
            .iter()
            .map(|event_type| {
                let bridge: Weak<EventBridge> = Arc::downgrade(self);
                let parent_id = parent_id.clone();
                events.subscribe(
                    event_type,
                    Arc::new(move |event: &Event| {
                        if let Some(bridge) = bridge.upgrade() {
                            bridge.forward(&parent_id, event);
                        }
                    }),
                )
            })
            .collect();
        state
            .subscriptions
            .insert(parent_id.clone(), ParentSubscription { events, ids });
        tracing::debug!(parent_id = %parent_id, "forwarding events to child sessions");
        true
    }

    /// Stop forwarding `parent_id`'s events and drop its child links.
    pub fn unsubscribe_parent(&self, parent_id: &str) -> bool {
        let removed = {
            let mut state = self.state.lock();
            if let Some(children) = state.children.remove(parent_id) {
                for (child_id, _) in children {
                    state.parents.remove(&child_id);
                }
            }
            state.subscriptions.remove(parent_id)
        };
        match removed {
            Some(subscription) => {
                for id in subscription.ids {
                    subscription.events.unsubscribe(id);
                }
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self, parent_id: &str) -> bool {
        self.state.lock().subscriptions.contains_key(parent_id)
    }

    /// Deliver a copy of `event` to every live child of `parent_id`.
    ///
    /// Events outside [`FORWARDED_EVENTS`] are ignored. Returns the number
    /// of children reached.
    pub fn forward(&self, parent_id: &str, event: &Event) -> usize {
        if !FORWARDED_EVENTS.contains(&event.event.as_str()) {
            return 0;
        }
        let targets: Vec<Arc<Session>> = {
            let state = self.state.lock();
            state
                .children
                .get(parent_id)
                .map(|children| children.iter().filter_map(|(_, s)| s.upgrade()).collect())
                .unwrap_or_default()
        };

        let copy = child_copy(event);
        let mut delivered = 0;
        for child in targets {
            if child.is_terminated() {
                continue;
            }
            child.client().events().process_event(copy.clone());
            delivered += 1;
        }
        if delivered > 0 {
            tracing::debug!(parent_id, event = %event.event, delivered, "forwarded event");
        }
        delivered
    }

    /// Linked children of `parent_id`, in link order.
    pub fn children_of(&self, parent_id: &str) -> Vec<String> {
        self.state
            .lock()
            .children
            .get(parent_id)
            .map(|children| children.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn parent_of(&self, child_id: &str) -> Option<String> {
        self.state.lock().parents.get(child_id).cloned()
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventBridge")
            .field("parents", &state.children.len())
            .field("subscriptions", &state.subscriptions.len())
            .finish()
    }
}
