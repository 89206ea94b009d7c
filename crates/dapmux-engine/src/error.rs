use dapmux_config::ConfigError;
use dapmux_dap::DapError;
use thiserror::Error;

use crate::state::SessionStatus;

/// Errors surfaced by session, breakpoint and engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Protocol or transport failure talking to the adapter.
    #[error(transparent)]
    Dap(#[from] DapError),

    /// The adapter does not support a requested feature.
    #[error("session {session_id}: adapter does not support {capability}: {detail}")]
    UnsupportedCapability {
        session_id: String,
        capability: &'static str,
        detail: String,
    },

    /// A caller-supplied value was rejected before reaching the adapter.
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// The operation is not valid in the session's current state.
    #[error("session {session_id}: cannot {operation} while {status}")]
    InvalidState {
        session_id: String,
        operation: &'static str,
        status: SessionStatus,
    },

    /// No live session has this id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The session already terminated and cannot be reused.
    #[error("session {0} has terminated")]
    SessionTerminated(String),

    /// No breakpoint matches the given id or location.
    #[error("session {session_id}: no breakpoint {target}")]
    BreakpointNotFound { session_id: String, target: String },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this is a connection-level failure (the adapter is gone or hung).
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, EngineError::Dap(e) if e.is_connection_failure())
    }
}
