//! Process-wide index of live sessions and their parent/child links.
//!
//! All mutations happen under one reentrant lock, so registry calls made
//! from inside another registry operation (or from an event handler the
//! operation triggers) do not deadlock. The `RefCell` borrow is always
//! released before such nested calls.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use crate::bridge::EventBridge;
use crate::error::EngineError;
use crate::session::Session;

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<String, Arc<Session>>,
    /// Registration order.
    order: Vec<String>,
    default_session: Option<String>,
    /// Ids that were unregistered and may never come back.
    retired: HashSet<String>,
    parent_to_children: HashMap<String, Vec<String>>,
    child_to_parent: HashMap<String, String>,
}

/// Authoritative map of session id to [`Session`].
pub struct SessionRegistry {
    state: ReentrantMutex<RefCell<RegistryState>>,
    bridge: Arc<EventBridge>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(RegistryState::default())),
            bridge: Arc::new(EventBridge::new()),
        }
    }

    pub fn bridge(&self) -> &Arc<EventBridge> {
        &self.bridge
    }

    /// Add a session. Child sessions are linked under their parent.
    ///
    /// The first registered session becomes the default.
    pub fn register(&self, session: Arc<Session>) -> Result<(), EngineError> {
        let guard = self.state.lock();
        let id = session.id().to_string();
        {
            let mut state = guard.borrow_mut();
            if state.retired.contains(&id) || session.is_terminated() {
                return Err(EngineError::SessionTerminated(id));
            }
            if state.sessions.contains_key(&id) {
                return Err(EngineError::validation(
                    "session_id",
                    format!("session {id} is already registered"),
                ));
            }
            state.sessions.insert(id.clone(), session.clone());
            state.order.push(id.clone());
            if state.default_session.is_none() {
                state.default_session = Some(id.clone());
            }
        }
        if let Some(parent_id) = session.parent_id() {
            if let Err(e) = self.register_child(parent_id, &id) {
                let mut state = guard.borrow_mut();
                state.sessions.remove(&id);
                state.order.retain(|s| *s != id);
                if state.default_session.as_deref() == Some(id.as_str()) {
                    state.default_session = state.order.last().cloned();
                }
                return Err(e);
            }
        }
        tracing::debug!(session_id = %id, "session registered");
        Ok(())
    }

    /// Remove a session and its links. Its id is retired.
    pub fn unregister(&self, id: &str) -> Option<Arc<Session>> {
        let guard = self.state.lock();
        if !guard.borrow().sessions.contains_key(id) {
            return None;
        }
        if guard.borrow().child_to_parent.contains_key(id) {
            self.unregister_child(id);
        }

        let removed = {
            let mut state = guard.borrow_mut();
            let removed = state.sessions.remove(id);
            state.order.retain(|s| s != id);
            state.retired.insert(id.to_string());
            // Children keep their parent id; only the index entry goes.
            if let Some(children) = state.parent_to_children.remove(id) {
                for child in children {
                    state.child_to_parent.remove(&child);
                }
            }
            if state.default_session.as_deref() == Some(id) {
                state.default_session = state.order.last().cloned();
            }
            removed
        };
        self.bridge.unsubscribe_parent(id);
        tracing::debug!(session_id = %id, "session unregistered");
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.state.lock().borrow().sessions.get(id).cloned()
    }

    /// Look up a session or fail with `SessionNotFound`.
    pub fn require(&self, id: &str) -> Result<Arc<Session>, EngineError> {
        self.get(id)
            .ok_or_else(|| EngineError::SessionNotFound(id.to_string()))
    }

    /// Every live session, in registration order.
    pub fn all(&self) -> Vec<Arc<Session>> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state
            .order
            .iter()
            .filter_map(|id| state.sessions.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().borrow().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` was registered once and has since been removed.
    pub fn is_retired(&self, id: &str) -> bool {
        self.state.lock().borrow().retired.contains(id)
    }

    /// Link `child_id` under `parent_id` and start forwarding the
    /// parent's run-state events to it.
    pub fn register_child(&self, parent_id: &str, child_id: &str) -> Result<(), EngineError> {
        let guard = self.state.lock();
        let (parent, child) = {
            let mut state = guard.borrow_mut();
            let parent = state
                .sessions
                .get(parent_id)
                .cloned()
                .ok_or_else(|| EngineError::SessionNotFound(parent_id.to_string()))?;
            let child = state
                .sessions
                .get(child_id)
                .cloned()
                .ok_or_else(|| EngineError::SessionNotFound(child_id.to_string()))?;
            let children = state
                .parent_to_children
                .entry(parent_id.to_string())
                .or_default();
            if !children.iter().any(|c| c == child_id) {
                children.push(child_id.to_string());
            }
            state
                .child_to_parent
                .insert(child_id.to_string(), parent_id.to_string());
            (parent, child)
        };
        parent.add_child(child_id);
        self.bridge.link(parent_id, &child);
        self.bridge.subscribe_parent(&parent);
        tracing::debug!(parent_id, child_id, "child session linked");
        Ok(())
    }

    /// Remove `child_id` from its parent's index. Returns the parent id.
    pub fn unregister_child(&self, child_id: &str) -> Option<String> {
        let guard = self.state.lock();
        let (parent_id, parent) = {
            let mut state = guard.borrow_mut();
            let parent_id = state.child_to_parent.remove(child_id)?;
            if let Some(children) = state.parent_to_children.get_mut(&parent_id) {
                children.retain(|c| c != child_id);
                if children.is_empty() {
                    state.parent_to_children.remove(&parent_id);
                }
            }
            let parent = state.sessions.get(&parent_id).cloned();
            (parent_id, parent)
        };
        if let Some(parent) = parent {
            parent.remove_child(child_id);
        }
        self.bridge.unlink_child(child_id);
        Some(parent_id)
    }

    /// Registered children of `parent_id`, in link order.
    pub fn children(&self, parent_id: &str) -> Vec<String> {
        self.state
            .lock()
            .borrow()
            .parent_to_children
            .get(parent_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every registered descendant of `id`, deepest first.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        for child in self.children(id) {
            out.extend(self.descendants(&child));
            out.push(child);
        }
        out
    }

    pub fn parent_of(&self, child_id: &str) -> Option<String> {
        self.state
            .lock()
            .borrow()
            .child_to_parent
            .get(child_id)
            .cloned()
    }

    pub fn default_session(&self) -> Option<Arc<Session>> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state
            .default_session
            .as_ref()
            .and_then(|id| state.sessions.get(id).cloned())
    }

    pub fn set_default(&self, id: &str) -> Result<(), EngineError> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if !state.sessions.contains_key(id) {
            return Err(EngineError::SessionNotFound(id.to_string()));
        }
        state.default_session = Some(id.to_string());
        Ok(())
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.state.lock();
        let state = guard.borrow();
        f.debug_struct("SessionRegistry")
            .field("sessions", &state.order)
            .field("default_session", &state.default_session)
            .finish()
    }
}
