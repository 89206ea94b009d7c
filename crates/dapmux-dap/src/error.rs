//! DAP error types.

use std::time::Duration;

use thiserror::Error;

/// Errors from DAP client operations.
#[derive(Debug, Error)]
pub enum DapError {
    /// Adapter process failed to start or the socket could not be opened.
    #[error("adapter connection failed: {0}")]
    Connect(#[from] std::io::Error),

    /// The byte stream to the adapter ended (adapter process exited).
    #[error("transport closed")]
    TransportClosed,

    /// A frame could not be decoded.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request timed out waiting for a response.
    #[error("request timed out after {}ms: {command}", .timeout.as_millis())]
    Timeout {
        /// The command that timed out.
        command: String,
        /// The bound that elapsed.
        timeout: Duration,
    },

    /// Adapter answered with `success: false`.
    #[error("adapter rejected {command}: {message}")]
    Rejected {
        /// The rejected command.
        command: String,
        /// The rejection message from the adapter.
        message: String,
    },

    /// Adapter sent an invalid or unparseable message.
    #[error("adapter sent invalid response: {0}")]
    InvalidResponse(String),

    /// The client has been marked terminated; nothing more is sent.
    #[error("session already terminated")]
    Terminated,
}

impl DapError {
    /// Whether this failure means the adapter connection is gone or hung.
    ///
    /// Execution control folds these into a terminated-state result.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            DapError::Connect(_)
                | DapError::TransportClosed
                | DapError::Timeout { .. }
                | DapError::Terminated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_connect_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = DapError::Connect(io_err);
        assert!(err.to_string().contains("adapter connection failed"));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn error_transport_display() {
        let err = DapError::Transport("missing Content-Length header".into());
        assert_eq!(
            err.to_string(),
            "transport error: missing Content-Length header"
        );
    }

    #[test]
    fn error_timeout_display() {
        let err = DapError::Timeout {
            command: "evaluate".into(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "request timed out after 250ms: evaluate");
    }

    #[test]
    fn error_rejected_display() {
        let err = DapError::Rejected {
            command: "setBreakpoints".into(),
            message: "not supported".into(),
        };
        assert_eq!(
            err.to_string(),
            "adapter rejected setBreakpoints: not supported"
        );
    }

    #[test]
    fn error_terminated_display() {
        let err = DapError::Terminated;
        assert_eq!(err.to_string(), "session already terminated");
    }

    #[test]
    fn error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let err: DapError = io_err.into();
        assert!(matches!(err, DapError::Connect(_)));
    }

    #[test]
    fn connection_failures_are_classified() {
        assert!(DapError::TransportClosed.is_connection_failure());
        assert!(DapError::Terminated.is_connection_failure());
        assert!(DapError::Timeout {
            command: "next".into(),
            timeout: Duration::from_secs(1),
        }
        .is_connection_failure());
        assert!(!DapError::Rejected {
            command: "next".into(),
            message: "no".into(),
        }
        .is_connection_failure());
        assert!(!DapError::InvalidResponse("x".into()).is_connection_failure());
    }
}
