//! Outstanding-request bookkeeping.
//!
//! Tracks pending requests by sequence number and routes each response to
//! the caller that issued the matching request, in whatever order the
//! adapter answers.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::protocol::Response;

/// Pending response slots keyed by request `seq`.
#[derive(Debug, Default)]
pub struct PendingRequests {
    pending: HashMap<i64, oneshot::Sender<Response>>,
}

impl PendingRequests {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and return the receiver for its response.
    pub fn register(&mut self, seq: i64) -> oneshot::Receiver<Response> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq, tx);
        rx
    }

    /// Deliver a response to its waiting caller.
    ///
    /// Returns `false` when no request with that `request_seq` is pending;
    /// the response is dropped.
    pub fn resolve(&mut self, response: Response) -> bool {
        match self.pending.remove(&response.request_seq) {
            Some(sender) => {
                // A caller that gave up (timeout) has dropped its receiver.
                let _ = sender.send(response);
                true
            }
            None => false,
        }
    }

    /// Forget a request whose caller stopped waiting.
    pub fn cancel(&mut self, seq: i64) -> bool {
        self.pending.remove(&seq).is_some()
    }

    /// Fail every outstanding request at once.
    ///
    /// Dropping the senders wakes each receiver with an error.
    pub fn fail_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// How many requests are pending.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(request_seq: i64, command: &str) -> Response {
        Response {
            seq: 100 + request_seq,
            message_type: "response".into(),
            request_seq,
            success: true,
            command: command.into(),
            message: None,
            body: None,
        }
    }

    #[tokio::test]
    async fn resolves_out_of_order() {
        let mut pending = PendingRequests::new();
        let rx1 = pending.register(1);
        let rx2 = pending.register(2);
        assert_eq!(pending.len(), 2);

        assert!(pending.resolve(response(2, "threads")));
        assert!(pending.resolve(response(1, "stackTrace")));
        assert!(pending.is_empty());

        assert_eq!(rx1.await.unwrap().command, "stackTrace");
        assert_eq!(rx2.await.unwrap().command, "threads");
    }

    #[test]
    fn unknown_request_seq_is_dropped() {
        let mut pending = PendingRequests::new();
        let _rx = pending.register(1);
        assert!(!pending.resolve(response(42, "next")));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn duplicate_response_is_dropped() {
        let mut pending = PendingRequests::new();
        let _rx = pending.register(1);
        assert!(pending.resolve(response(1, "next")));
        assert!(!pending.resolve(response(1, "next")));
    }

    #[tokio::test]
    async fn fail_all_wakes_receivers() {
        let mut pending = PendingRequests::new();
        let rx1 = pending.register(1);
        let rx2 = pending.register(2);
        assert_eq!(pending.fail_all(), 2);
        assert!(rx1.await.is_err());
        assert!(rx2.await.is_err());
    }

    #[test]
    fn cancel_removes_slot() {
        let mut pending = PendingRequests::new();
        let _rx = pending.register(5);
        assert!(pending.cancel(5));
        assert!(!pending.cancel(5));
        assert!(pending.is_empty());
    }
}
