//! Async DAP client bound to one adapter connection.
//!
//! Owns the writer task and the inbound read loop, assigns sequence
//! numbers, correlates responses with outstanding requests and hands
//! events to the connection's [`EventProcessor`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::capabilities::DapCapabilities;
use crate::error::DapError;
use crate::events::EventProcessor;
use crate::pending::PendingRequests;
use crate::protocol::{
    parse_message, Capabilities, InitializeRequestArguments, Message, Request, Response,
};
use crate::transport::{BoxedReader, BoxedWriter, FrameReader, FrameWriter, Transport};

/// Default bound for ordinary requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound for `terminate`/`disconnect`, so teardown stays bounded.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(3);

/// Per-request-class timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Bound for ordinary requests.
    pub request_timeout: Duration,
    /// Bound for `terminate` and `disconnect`.
    pub terminate_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
        }
    }
}

impl ClientOptions {
    /// The timeout that applies to `command`.
    pub fn timeout_for(&self, command: &str) -> Duration {
        match command {
            "terminate" | "disconnect" => self.terminate_timeout,
            _ => self.request_timeout,
        }
    }
}

struct Inner {
    label: String,
    seq: AtomicI64,
    pending: Mutex<PendingRequests>,
    writer_tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    events: Arc<EventProcessor>,
    terminated: watch::Sender<bool>,
    capabilities: OnceLock<DapCapabilities>,
    reverse_sink: Mutex<Option<mpsc::UnboundedSender<Request>>>,
    options: ClientOptions,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl Inner {
    fn mark_terminated(&self) {
        self.terminated.send_replace(true);
    }

    /// Allocate a seq and queue the frame under one lock so that wire
    /// order always matches seq order.
    fn enqueue(
        &self,
        build: impl FnOnce(i64) -> Result<Vec<u8>, DapError>,
        expect_response: bool,
    ) -> Result<(i64, Option<oneshot::Receiver<Response>>), DapError> {
        let mut pending = self.pending.lock();
        let writer = self
            .writer_tx
            .lock()
            .clone()
            .ok_or(DapError::TransportClosed)?;
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let body = build(seq)?;
        let rx = expect_response.then(|| pending.register(seq));
        if writer.send(body).is_err() {
            pending.cancel(seq);
            return Err(DapError::TransportClosed);
        }
        Ok((seq, rx))
    }

    fn handle_frame(&self, body: &[u8]) {
        let message = match parse_message(body) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(client = %self.label, error = %e, "dropping malformed frame");
                return;
            }
        };

        match message {
            Message::Response(response) => {
                let request_seq = response.request_seq;
                let command = response.command.clone();
                if !self.pending.lock().resolve(response) {
                    tracing::warn!(
                        client = %self.label,
                        request_seq,
                        command = %command,
                        "dropping response for unknown request"
                    );
                }
            }
            Message::Event(event) => {
                tracing::debug!(client = %self.label, event = %event.event, seq = event.seq, "event");
                if event.event == "terminated" {
                    self.mark_terminated();
                }
                self.events.process_event(event);
            }
            Message::Request(request) => {
                let sink = self.reverse_sink.lock().clone();
                match sink {
                    Some(tx) if tx.send(request.clone()).is_ok() => {}
                    _ => tracing::warn!(
                        client = %self.label,
                        command = %request.command,
                        "ignoring reverse request"
                    ),
                }
            }
        }
    }

    fn on_transport_closed(&self) {
        tracing::info!(client = %self.label, "adapter transport closed");
        self.mark_terminated();
        self.writer_tx.lock().take();
        self.reverse_sink.lock().take();
        let failed = self.pending.lock().fail_all();
        if failed > 0 {
            tracing::debug!(client = %self.label, failed, "failed pending requests");
        }
        self.events.mark_closed();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// A DAP client connected to a single debug adapter.
///
/// Cloning yields another handle to the same connection.
#[derive(Clone)]
pub struct DapClient {
    inner: Arc<Inner>,
}

impl DapClient {
    /// Start the writer task and inbound loop over `transport`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(transport: Transport, options: ClientOptions, label: impl Into<String>) -> Self {
        let Transport {
            reader,
            writer,
            child,
        } = transport;
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let (terminated, _) = watch::channel(false);

        let inner = Arc::new(Inner {
            label: label.into(),
            seq: AtomicI64::new(1),
            pending: Mutex::new(PendingRequests::new()),
            writer_tx: Mutex::new(Some(writer_tx)),
            events: Arc::new(EventProcessor::new()),
            terminated,
            capabilities: OnceLock::new(),
            reverse_sink: Mutex::new(None),
            options,
            tasks: Mutex::new(Vec::new()),
            child: tokio::sync::Mutex::new(child),
        });

        let write_task = tokio::spawn(write_loop(
            inner.label.clone(),
            writer_rx,
            FrameWriter::new(writer),
        ));
        let read_task = tokio::spawn(read_loop(Arc::downgrade(&inner), FrameReader::new(reader)));
        inner.tasks.lock().extend([write_task, read_task]);

        Self { inner }
    }

    /// Label used in log lines (the owning session id).
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// The event processor fed by this connection.
    pub fn events(&self) -> &Arc<EventProcessor> {
        &self.inner.events
    }

    /// The configured timeouts.
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Allocate the next sequence number.
    pub fn next_seq(&self) -> i64 {
        self.inner.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Whether a `terminated` event arrived, the transport closed, or the
    /// client was shut down.
    pub fn is_terminated(&self) -> bool {
        *self.inner.terminated.borrow()
    }

    /// Stop sending requests on this connection.
    pub fn mark_terminated(&self) {
        self.inner.mark_terminated();
    }

    /// Number of requests still awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Capabilities negotiated during `initialize` (all false before).
    pub fn capabilities(&self) -> DapCapabilities {
        self.inner.capabilities.get().cloned().unwrap_or_default()
    }

    /// Whether `initialize` has completed.
    pub fn is_initialized(&self) -> bool {
        self.inner.capabilities.get().is_some()
    }

    /// Send a request with the timeout for its command class.
    pub async fn send_request(
        &self,
        command: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<Response, DapError> {
        let timeout = self.inner.options.timeout_for(command);
        self.send_request_with_timeout(command, arguments, timeout)
            .await
    }

    /// Send a request and suspend until its response, the timeout, or
    /// termination of the client.
    pub async fn send_request_with_timeout(
        &self,
        command: &str,
        arguments: Option<serde_json::Value>,
        timeout: Duration,
    ) -> Result<Response, DapError> {
        self.queue_request_with_timeout(command, arguments, timeout)?
            .response()
            .await
    }

    /// Put a request on the wire without waiting for its response.
    ///
    /// The frame is queued before this returns, so anything sent afterwards
    /// reaches the adapter behind it.
    pub fn queue_request(
        &self,
        command: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<PendingResponse, DapError> {
        let timeout = self.inner.options.timeout_for(command);
        self.queue_request_with_timeout(command, arguments, timeout)
    }

    fn queue_request_with_timeout(
        &self,
        command: &str,
        arguments: Option<serde_json::Value>,
        timeout: Duration,
    ) -> Result<PendingResponse, DapError> {
        if self.is_terminated() {
            return Err(DapError::Terminated);
        }
        let (seq, rx) = self.inner.enqueue(
            |seq| {
                let request = Request::new(seq, command, arguments);
                serde_json::to_vec(&request)
                    .map_err(|e| DapError::Transport(format!("encode {command}: {e}")))
            },
            true,
        )?;
        let rx = rx.ok_or(DapError::TransportClosed)?;
        tracing::debug!(client = %self.inner.label, seq, command, "request");
        Ok(PendingResponse {
            client: self.clone(),
            seq,
            command: command.to_string(),
            timeout,
            rx,
        })
    }

    /// Send a request, require success and decode its body.
    pub async fn request<T: DeserializeOwned>(
        &self,
        command: &str,
        arguments: impl Serialize,
    ) -> Result<T, DapError> {
        let arguments = serde_json::to_value(arguments)
            .map_err(|e| DapError::Transport(format!("encode {command}: {e}")))?;
        let arguments = (!arguments.is_null()).then_some(arguments);
        self.send_request(command, arguments)
            .await?
            .into_result()?
            .parse_body()
    }

    /// Perform the `initialize` request and capture the capability snapshot.
    pub async fn initialize(
        &self,
        arguments: &InitializeRequestArguments,
    ) -> Result<DapCapabilities, DapError> {
        let caps: Option<Capabilities> = self.request("initialize", arguments).await?;
        let resolved = DapCapabilities::from(&caps.unwrap_or_default());
        if self.inner.capabilities.set(resolved).is_err() {
            tracing::warn!(client = %self.inner.label, "capabilities already negotiated; keeping the first snapshot");
        }
        Ok(self.capabilities())
    }

    /// Route reverse requests from the adapter to `sink`.
    pub fn set_reverse_request_sink(&self, sink: mpsc::UnboundedSender<Request>) {
        *self.inner.reverse_sink.lock() = Some(sink);
    }

    /// Answer a reverse request.
    pub fn respond(
        &self,
        request: &Request,
        success: bool,
        message: Option<String>,
        body: Option<serde_json::Value>,
    ) -> Result<(), DapError> {
        self.inner
            .enqueue(
                |seq| {
                    let response = Response {
                        seq,
                        message_type: "response".into(),
                        request_seq: request.seq,
                        success,
                        command: request.command.clone(),
                        message,
                        body,
                    };
                    serde_json::to_vec(&response).map_err(|e| {
                        DapError::Transport(format!("encode {} response: {e}", request.command))
                    })
                },
                false,
            )
            .map(|_| ())
    }

    /// Tear the connection down.
    ///
    /// Closes the writer and the reverse-request sink, gives a spawned
    /// adapter process up to `process_timeout` to exit before killing it,
    /// and stops the inbound loop. Outstanding requests fail immediately.
    pub async fn shutdown(&self, process_timeout: Duration) {
        self.inner.mark_terminated();
        self.inner.writer_tx.lock().take();
        self.inner.reverse_sink.lock().take();

        if let Some(mut child) = self.inner.child.lock().await.take() {
            match tokio::time::timeout(process_timeout, child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::debug!(client = %self.inner.label, %status, "adapter exited");
                }
                _ => {
                    tracing::warn!(client = %self.inner.label, "adapter did not exit; killing it");
                    let _ = child.kill().await;
                }
            }
        }

        let tasks: Vec<JoinHandle<()>> = self.inner.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        self.inner.pending.lock().fail_all();
        self.inner.events.mark_closed();
    }
}

impl std::fmt::Debug for DapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DapClient")
            .field("label", &self.inner.label)
            .field("terminated", &self.is_terminated())
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// A request that is on the wire and still owed a response.
///
/// Dropping it forgets the request; a late response is then logged and
/// discarded.
pub struct PendingResponse {
    client: DapClient,
    seq: i64,
    command: String,
    timeout: Duration,
    rx: oneshot::Receiver<Response>,
}

impl PendingResponse {
    pub fn seq(&self) -> i64 {
        self.seq
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// The response if it already arrived.
    pub fn try_response(&mut self) -> Option<Result<Response, DapError>> {
        match self.rx.try_recv() {
            Ok(response) => Some(Ok(response)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(DapError::TransportClosed)),
        }
    }

    /// Suspend until the response, the timeout, or termination of the client.
    pub async fn response(mut self) -> Result<Response, DapError> {
        let inner = Arc::clone(&self.client.inner);
        let mut terminated = inner.terminated.subscribe();
        let (seq, timeout) = (self.seq, self.timeout);

        tokio::select! {
            biased;
            result = &mut self.rx => result.map_err(|_| DapError::TransportClosed),
            _ = terminated.wait_for(|t| *t) => {
                inner.pending.lock().cancel(seq);
                Err(DapError::Terminated)
            }
            _ = tokio::time::sleep(timeout) => {
                inner.pending.lock().cancel(seq);
                tracing::warn!(client = %inner.label, seq, command = %self.command, "request timed out");
                Err(DapError::Timeout {
                    command: self.command.clone(),
                    timeout,
                })
            }
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.client.inner.pending.lock().cancel(self.seq);
    }
}

impl std::fmt::Debug for PendingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResponse")
            .field("seq", &self.seq)
            .field("command", &self.command)
            .finish()
    }
}

async fn write_loop(
    label: String,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    mut writer: FrameWriter<BoxedWriter>,
) {
    while let Some(body) = rx.recv().await {
        if let Err(e) = writer.write_frame(&body).await {
            tracing::warn!(client = %label, error = %e, "write to adapter failed");
            break;
        }
    }
    writer.close().await;
}

async fn read_loop(inner: Weak<Inner>, mut reader: FrameReader<BoxedReader>) {
    loop {
        let frame = reader.read_frame().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match frame {
            Ok(body) => inner.handle_frame(&body),
            Err(DapError::TransportClosed) => {
                inner.on_transport_closed();
                return;
            }
            Err(e) => {
                tracing::warn!(client = %inner.label, error = %e, "dropping malformed frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::WaitOutcome;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    struct FakeAdapter {
        reader: FrameReader<ReadHalf<DuplexStream>>,
        writer: FrameWriter<WriteHalf<DuplexStream>>,
        seq: i64,
    }

    impl FakeAdapter {
        async fn next_request(&mut self) -> Request {
            let body = self.reader.read_frame().await.unwrap();
            serde_json::from_slice(&body).unwrap()
        }

        async fn send(&mut self, value: serde_json::Value) {
            self.writer
                .write_frame(&serde_json::to_vec(&value).unwrap())
                .await
                .unwrap();
        }

        async fn respond(&mut self, request: &Request, body: serde_json::Value) {
            self.seq += 1;
            let seq = self.seq;
            self.send(serde_json::json!({
                "seq": seq,
                "type": "response",
                "request_seq": request.seq,
                "success": true,
                "command": request.command,
                "body": body,
            }))
            .await;
        }

        async fn event(&mut self, event: &str, body: serde_json::Value) {
            self.seq += 1;
            let seq = self.seq;
            self.send(serde_json::json!({
                "seq": seq, "type": "event", "event": event, "body": body,
            }))
            .await;
        }
    }

    fn connect(options: ClientOptions) -> (DapClient, FakeAdapter) {
        let (client_io, adapter_io) = tokio::io::duplex(64 * 1024);
        let (cr, cw) = tokio::io::split(client_io);
        let (ar, aw) = tokio::io::split(adapter_io);
        let client = DapClient::start(Transport::from_streams(cr, cw), options, "test-1");
        let adapter = FakeAdapter {
            reader: FrameReader::new(ar),
            writer: FrameWriter::new(aw),
            seq: 1000,
        };
        (client, adapter)
    }

    #[tokio::test]
    async fn client_correlates_out_of_order_responses() {
        let (client, mut adapter) = connect(ClientOptions::default());

        let c1 = client.clone();
        let first = tokio::spawn(async move { c1.send_request("threads", None).await });
        let r1 = adapter.next_request().await;
        let c2 = client.clone();
        let second = tokio::spawn(async move { c2.send_request("stackTrace", None).await });
        let r2 = adapter.next_request().await;
        assert!(r2.seq > r1.seq);

        adapter.respond(&r2, serde_json::json!({"tag": "second"})).await;
        adapter.respond(&r1, serde_json::json!({"tag": "first"})).await;

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.request_seq, r1.seq);
        assert_eq!(first.body.unwrap()["tag"], "first");
        assert_eq!(second.request_seq, r2.seq);
        assert_eq!(second.body.unwrap()["tag"], "second");
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn client_drops_unknown_response_and_keeps_going() {
        let (client, mut adapter) = connect(ClientOptions::default());

        let c = client.clone();
        let call = tokio::spawn(async move { c.send_request("threads", None).await });
        let request = adapter.next_request().await;

        adapter
            .send(serde_json::json!({
                "seq": 1, "type": "response", "request_seq": 9999,
                "success": true, "command": "threads"
            }))
            .await;
        adapter.send(serde_json::json!({"garbage": true})).await;
        adapter.respond(&request, serde_json::json!({"threads": []})).await;

        let response = call.await.unwrap().unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn client_request_times_out() {
        let options = ClientOptions {
            request_timeout: Duration::from_millis(30),
            terminate_timeout: Duration::from_millis(10),
        };
        let (client, mut adapter) = connect(options);
        let c = client.clone();
        let call = tokio::spawn(async move { c.send_request("evaluate", None).await });
        let _request = adapter.next_request().await;

        match call.await.unwrap() {
            Err(DapError::Timeout { command, timeout }) => {
                assert_eq!(command, "evaluate");
                assert_eq!(timeout, Duration::from_millis(30));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn queued_request_reaches_the_wire_before_later_ones() {
        let (client, mut adapter) = connect(ClientOptions::default());

        let launch = client.queue_request("launch", None).unwrap();
        let c = client.clone();
        let done = tokio::spawn(async move { c.send_request("configurationDone", None).await });

        let first = adapter.next_request().await;
        let second = adapter.next_request().await;
        assert_eq!(first.command, "launch");
        assert_eq!(first.seq, launch.seq());
        assert_eq!(second.command, "configurationDone");

        adapter.respond(&second, serde_json::json!({})).await;
        assert!(done.await.unwrap().unwrap().success);
        adapter.respond(&first, serde_json::json!({})).await;
        let response = launch.response().await.unwrap();
        assert_eq!(response.request_seq, first.seq);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn dropping_a_queued_request_forgets_it() {
        let (client, mut adapter) = connect(ClientOptions::default());
        let mut pending = client.queue_request("launch", None).unwrap();
        let request = adapter.next_request().await;
        assert!(pending.try_response().is_none());
        assert_eq!(client.pending_count(), 1);

        drop(pending);
        assert_eq!(client.pending_count(), 0);
        adapter.respond(&request, serde_json::json!({})).await;
    }

    #[test]
    fn terminate_requests_use_their_own_timeout() {
        let options = ClientOptions {
            request_timeout: Duration::from_secs(10),
            terminate_timeout: Duration::from_secs(1),
        };
        assert_eq!(options.timeout_for("disconnect"), Duration::from_secs(1));
        assert_eq!(options.timeout_for("terminate"), Duration::from_secs(1));
        assert_eq!(options.timeout_for("next"), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn transport_closure_fails_pending_requests_immediately() {
        let (client, mut adapter) = connect(ClientOptions::default());
        let c = client.clone();
        let call = tokio::spawn(async move { c.send_request("continue", None).await });
        let _request = adapter.next_request().await;
        drop(adapter);

        let result = tokio::time::timeout(Duration::from_secs(1), call)
            .await
            .expect("pending request must fail before its own timeout")
            .unwrap();
        assert!(matches!(
            result,
            Err(DapError::TransportClosed) | Err(DapError::Terminated)
        ));
        assert!(client.is_terminated());
        assert!(matches!(
            client.send_request("threads", None).await,
            Err(DapError::Terminated)
        ));
        assert!(client.events().last_event("terminated").is_some());
    }

    #[tokio::test]
    async fn terminated_event_marks_client() {
        let (client, mut adapter) = connect(ClientOptions::default());
        let waiter = client.events().arm(&["terminated"]);
        adapter.event("terminated", serde_json::json!({})).await;

        assert!(matches!(
            waiter.wait(Duration::from_secs(1)).await,
            WaitOutcome::Event(_)
        ));
        assert!(client.is_terminated());
        assert!(matches!(
            client.send_request("next", None).await,
            Err(DapError::Terminated)
        ));
    }

    #[tokio::test]
    async fn initialize_captures_capabilities() {
        let (client, mut adapter) = connect(ClientOptions::default());
        assert!(!client.is_initialized());

        let c = client.clone();
        let call = tokio::spawn(async move {
            c.initialize(&InitializeRequestArguments::for_adapter("debugpy"))
                .await
        });
        let request = adapter.next_request().await;
        assert_eq!(request.command, "initialize");
        assert_eq!(request.arguments.as_ref().unwrap()["adapterID"], "debugpy");
        adapter
            .respond(
                &request,
                serde_json::json!({
                    "supportsConfigurationDoneRequest": true,
                    "supportsConditionalBreakpoints": true
                }),
            )
            .await;

        let caps = call.await.unwrap().unwrap();
        assert!(caps.supports_conditional_breakpoints);
        assert!(!caps.supports_log_points);
        assert!(client.is_initialized());
        assert_eq!(client.capabilities(), caps);
    }

    #[tokio::test]
    async fn rejected_request_surfaces_adapter_message() {
        let (client, mut adapter) = connect(ClientOptions::default());
        let c = client.clone();
        let call = tokio::spawn(async move {
            c.request::<serde_json::Value>("evaluate", serde_json::json!({"expression": "y"}))
                .await
        });
        let request = adapter.next_request().await;
        adapter
            .send(serde_json::json!({
                "seq": 5, "type": "response", "request_seq": request.seq,
                "success": false, "command": "evaluate", "message": "name 'y' is not defined"
            }))
            .await;

        match call.await.unwrap() {
            Err(DapError::Rejected { command, message }) => {
                assert_eq!(command, "evaluate");
                assert!(message.contains("not defined"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn shutdown_closes_the_reverse_request_sink() {
        let (client, _adapter) = connect(ClientOptions::default());
        let (tx, mut rx) = mpsc::unbounded_channel::<Request>();
        client.set_reverse_request_sink(tx);

        client.shutdown(Duration::from_millis(10)).await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn transport_closure_closes_the_reverse_request_sink() {
        let (client, adapter) = connect(ClientOptions::default());
        let (tx, mut rx) = mpsc::unbounded_channel::<Request>();
        client.set_reverse_request_sink(tx);

        drop(adapter);
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(closed, Ok(None)));
    }

    #[tokio::test]
    async fn reverse_requests_reach_the_sink_and_can_be_answered() {
        let (client, mut adapter) = connect(ClientOptions::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.set_reverse_request_sink(tx);

        adapter
            .send(serde_json::json!({
                "seq": 77, "type": "request", "command": "startDebugging",
                "arguments": {"request": "launch", "configuration": {"__pendingTargetId": "abc"}}
            }))
            .await;
        let request = rx.recv().await.unwrap();
        assert_eq!(request.command, "startDebugging");

        client.respond(&request, true, None, None).unwrap();
        let body = adapter.reader.read_frame().await.unwrap();
        let response: Response = serde_json::from_slice(&body).unwrap();
        assert_eq!(response.request_seq, 77);
        assert!(response.success);
    }

    #[tokio::test]
    async fn requests_hit_the_wire_in_seq_order() {
        let (client, mut adapter) = connect(ClientOptions::default());
        let mut calls = Vec::new();
        for _ in 0..8 {
            let c = client.clone();
            calls.push(tokio::spawn(async move {
                c.send_request("threads", None).await
            }));
        }
        let mut last = 0;
        let mut requests = Vec::new();
        for _ in 0..8 {
            let request = adapter.next_request().await;
            assert!(request.seq > last);
            last = request.seq;
            requests.push(request);
        }
        for request in requests.iter().rev() {
            adapter.respond(request, serde_json::json!({"threads": []})).await;
        }
        for call in calls {
            assert!(call.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn shutdown_is_terminal() {
        let (client, _adapter) = connect(ClientOptions::default());
        client.shutdown(Duration::from_millis(50)).await;
        assert!(client.is_terminated());
        assert!(client.events().is_closed());
        assert!(matches!(
            client.send_request("threads", None).await,
            Err(DapError::Terminated)
        ));
    }
}
