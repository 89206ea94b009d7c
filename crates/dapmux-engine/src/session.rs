//! A debug session: one adapter connection plus the state derived from it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dapmux_config::SessionConfig;
use dapmux_dap::{
    BreakpointEventBody, ContinueArguments, ContinueResponseBody, DapClient, DapError, Dispatch,
    Event, ExitedEventBody, OutputEventBody, PendingResponse, StackFrame, StopReason, StoppedEventBody,
    SubscriptionId, WaitOutcome,
};
use parking_lot::Mutex;
use serde_json::Value;

use crate::breakpoint::{BreakpointSpec, BreakpointStore, FunctionBreakpointSpec};
use crate::error::EngineError;
use crate::language::{AdapterProfile, AttachTarget, CapabilitySet, Language, LaunchTarget, SessionMode};
use crate::state::{ExecutionState, Location, OutputBuffer, OutputRecord, SessionStatus};

/// Breakpoints for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBreakpoints {
    pub file: PathBuf,
    pub specs: Vec<BreakpointSpec>,
}

/// Everything needed to create and start a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub language: Language,
    pub mode: SessionMode,
    /// Applied before the debuggee starts running.
    pub breakpoints: Vec<SourceBreakpoints>,
    pub function_breakpoints: Vec<FunctionBreakpointSpec>,
    pub exception_filters: Vec<String>,
}

impl SessionOptions {
    pub fn launch(language: Language, target: LaunchTarget) -> Self {
        Self {
            language,
            mode: SessionMode::Launch(target),
            breakpoints: Vec::new(),
            function_breakpoints: Vec::new(),
            exception_filters: Vec::new(),
        }
    }

    pub fn attach(language: Language, target: AttachTarget) -> Self {
        Self {
            language,
            mode: SessionMode::Attach(target),
            breakpoints: Vec::new(),
            function_breakpoints: Vec::new(),
            exception_filters: Vec::new(),
        }
    }

    /// Add initial breakpoints for `file`.
    pub fn with_breakpoints(mut self, file: impl Into<PathBuf>, specs: Vec<BreakpointSpec>) -> Self {
        self.breakpoints.push(SourceBreakpoints {
            file: file.into(),
            specs,
        });
        self
    }

    pub fn with_exception_filters(mut self, filters: Vec<String>) -> Self {
        self.exception_filters = filters;
        self
    }

    pub(crate) fn plan(&self) -> Result<LaunchPlan, EngineError> {
        let (command, arguments, stop_on_entry) = match &self.mode {
            SessionMode::Launch(target) => (
                "launch",
                self.language.launch_arguments(target)?,
                target.stop_on_entry,
            ),
            SessionMode::Attach(target) => ("attach", self.language.attach_arguments(target), false),
        };
        Ok(LaunchPlan {
            command: command.to_string(),
            arguments,
            stop_on_entry,
            breakpoints: self.breakpoints.clone(),
            function_breakpoints: self.function_breakpoints.clone(),
            exception_filters: self.exception_filters.clone(),
        })
    }
}

/// The launch/attach request and what to configure before it runs.
#[derive(Debug, Clone)]
pub(crate) struct LaunchPlan {
    pub command: String,
    pub arguments: Value,
    pub stop_on_entry: bool,
    pub breakpoints: Vec<SourceBreakpoints>,
    pub function_breakpoints: Vec<FunctionBreakpointSpec>,
    pub exception_filters: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct StopInfo {
    pub reason: StopReason,
    pub thread_id: Option<i64>,
    pub description: Option<String>,
}

/// Last-known top of stack; cleared on every continue or step.
#[derive(Debug, Clone)]
pub(crate) struct FrameCache {
    pub thread_id: i64,
    pub frame: StackFrame,
}

#[derive(Debug)]
pub(crate) struct SessionInner {
    pub status: SessionStatus,
    pub stop: Option<StopInfo>,
    pub frame_cache: Option<FrameCache>,
    pub exit_code: Option<i64>,
    pub description: Option<String>,
    pub children: Vec<String>,
}

/// One debug session bound to a single adapter connection.
pub struct Session {
    id: String,
    profile: AdapterProfile,
    parent_id: Option<String>,
    settings: SessionConfig,
    client: DapClient,
    started: AtomicBool,
    pub(crate) inner: Mutex<SessionInner>,
    pub(crate) breakpoints: Mutex<BreakpointStore>,
    /// Serializes breakpoint round trips so store updates land in order.
    pub(crate) breakpoint_updates: tokio::sync::Mutex<()>,
    output: Mutex<OutputBuffer>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl Session {
    /// Wrap a started client. Event handlers are installed immediately.
    pub fn new(
        id: impl Into<String>,
        profile: AdapterProfile,
        settings: SessionConfig,
        client: DapClient,
        parent_id: Option<String>,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            id: id.into(),
            output: Mutex::new(OutputBuffer::new(settings.output_buffer_lines)),
            profile,
            parent_id,
            settings,
            client,
            started: AtomicBool::new(false),
            inner: Mutex::new(SessionInner {
                status: SessionStatus::Initializing,
                stop: None,
                frame_cache: None,
                exit_code: None,
                description: None,
                children: Vec::new(),
            }),
            breakpoints: Mutex::new(BreakpointStore::new()),
            breakpoint_updates: tokio::sync::Mutex::new(()),
            subscriptions: Mutex::new(Vec::new()),
        });
        session.install_handlers();
        session
    }

    fn install_handlers(self: &Arc<Self>) {
        let events = self.client.events();

        let weak = Arc::downgrade(self);
        events.set_interceptor(Some(Arc::new(move |event: &Event| {
            weak.upgrade()
                .map_or(Dispatch::Deliver, |session| session.intercept(event))
        })));

        let handlers: [(&str, fn(&Session, &Event)); 6] = [
            ("stopped", Session::on_stopped),
            ("continued", Session::on_continued),
            ("terminated", Session::on_terminated),
            ("exited", Session::on_exited),
            ("breakpoint", Session::on_breakpoint),
            ("output", Session::on_output),
        ];
        let ids = handlers
            .into_iter()
            .map(|(event_type, handler)| {
                let weak: Weak<Session> = Arc::downgrade(self);
                events.subscribe(
                    event_type,
                    Arc::new(move |event: &Event| {
                        if let Some(session) = weak.upgrade() {
                            handler(&session, event);
                        }
                    }),
                )
            })
            .collect();
        *self.subscriptions.lock() = ids;
    }

    /// Counts breakpoint hits on `stopped` and swallows stops that should
    /// not pause: logpoints, and hit conditions not yet met. The thread is
    /// resumed in the background.
    fn intercept(&self, event: &Event) -> Dispatch {
        if event.event != "stopped" {
            return Dispatch::Deliver;
        }
        let Ok(body) = event.parse_body::<StoppedEventBody>() else {
            return Dispatch::Deliver;
        };
        let ids = body.hit_breakpoint_ids.unwrap_or_default();
        if self.breakpoints.lock().record_stop(&ids) {
            return Dispatch::Deliver;
        }
        let Some(thread_id) = body.thread_id.or_else(|| self.client.events().current_thread_id())
        else {
            return Dispatch::Deliver;
        };

        tracing::debug!(session_id = %self.id, thread_id, ?ids, "resuming past breakpoint hit");
        let client = self.client.clone();
        let session_id = self.id.clone();
        tokio::spawn(async move {
            let resumed = client
                .request::<Option<ContinueResponseBody>>(
                    "continue",
                    ContinueArguments {
                        thread_id,
                        single_thread: None,
                    },
                )
                .await;
            if let Err(e) = resumed {
                tracing::warn!(session_id = %session_id, error = %e, "could not resume past breakpoint hit");
            }
        });
        Dispatch::Suppress
    }

    fn on_stopped(&self, event: &Event) {
        let body = match event.parse_body::<StoppedEventBody>() {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "malformed stopped event");
                return;
            }
        };
        let mut inner = self.inner.lock();
        if inner.status.is_terminal() {
            return;
        }
        inner.status = SessionStatus::Paused;
        inner.frame_cache = None;
        inner.stop = Some(StopInfo {
            reason: body.reason.clone(),
            thread_id: body
                .thread_id
                .or_else(|| self.client.events().current_thread_id()),
            description: body.description.or(body.text),
        });
        tracing::debug!(session_id = %self.id, reason = %body.reason, "paused");
    }

    fn on_continued(&self, event: &Event) {
        let mut inner = self.inner.lock();
        if inner.status.is_terminal() {
            return;
        }
        inner.status = SessionStatus::Running;
        inner.frame_cache = None;
        inner.stop = None;
        tracing::debug!(session_id = %self.id, seq = event.seq, "running");
    }

    fn on_terminated(&self, _event: &Event) {
        let mut inner = self.inner.lock();
        if inner.status.is_terminal() {
            return;
        }
        inner.status = SessionStatus::Terminated;
        inner.frame_cache = None;
        inner.stop = None;
        tracing::info!(session_id = %self.id, "session terminated");
    }

    fn on_exited(&self, event: &Event) {
        if let Ok(body) = event.parse_body::<ExitedEventBody>() {
            self.inner.lock().exit_code = Some(body.exit_code);
            tracing::info!(session_id = %self.id, exit_code = body.exit_code, "debuggee exited");
        }
    }

    fn on_breakpoint(&self, event: &Event) {
        match event.parse_body::<BreakpointEventBody>() {
            Ok(body) => {
                if !self
                    .breakpoints
                    .lock()
                    .apply_event(&body.reason, &body.breakpoint)
                {
                    tracing::debug!(session_id = %self.id, reason = %body.reason, "breakpoint event for unknown id");
                }
            }
            Err(e) => tracing::warn!(session_id = %self.id, error = %e, "malformed breakpoint event"),
        }
    }

    fn on_output(&self, event: &Event) {
        match event.parse_body::<OutputEventBody>() {
            Ok(body) => self.output.lock().push(OutputRecord::from(body)),
            Err(e) => tracing::warn!(session_id = %self.id, error = %e, "malformed output event"),
        }
    }

    /// Run the DAP handshake and launch or attach.
    pub(crate) async fn start(&self, plan: LaunchPlan) -> Result<ExecutionState, EngineError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(self.invalid_state("start"));
        }

        // Adapters may send `initialized` right behind the response.
        let events = self.client.events();
        let initialized = events.arm(&["initialized"]);
        let caps = self
            .client
            .initialize(&self.language().initialize_arguments())
            .await?;
        tracing::info!(session_id = %self.id, adapter = self.language().adapter_id(), "adapter initialized");

        let entry_stop = plan
            .stop_on_entry
            .then(|| events.arm(&["stopped", "terminated"]));

        // Queued before anything else goes out; the response only arrives
        // after configurationDone.
        let mut launch = self
            .client
            .queue_request(&plan.command, Some(plan.arguments.clone()))?;

        match initialized.wait(self.settings.request_timeout()).await {
            WaitOutcome::Event(_) => {}
            WaitOutcome::TimedOut => {
                let fallback = DapError::Timeout {
                    command: "initialized".to_string(),
                    timeout: self.settings.request_timeout(),
                };
                return Err(launch_failure(&mut launch, fallback));
            }
            WaitOutcome::Closed => {
                return Err(launch_failure(&mut launch, DapError::TransportClosed));
            }
        }

        for group in &plan.breakpoints {
            self.set_breakpoints(&group.file, group.specs.clone())
                .await?;
        }
        if !plan.function_breakpoints.is_empty() {
            self.set_function_breakpoints(plan.function_breakpoints.clone())
                .await?;
        }
        if !plan.exception_filters.is_empty() {
            self.set_exception_breakpoints(&plan.exception_filters)
                .await?;
        }
        if caps.supports_configuration_done_request {
            self.client
                .send_request("configurationDone", None)
                .await?
                .into_result()?;
        }

        launch.response().await?.into_result()?;

        {
            let mut inner = self.inner.lock();
            if inner.status == SessionStatus::Initializing {
                inner.status = SessionStatus::Running;
            }
        }
        if let Some(waiter) = entry_stop {
            if self.status() == SessionStatus::Running {
                waiter.wait(self.settings.stop_wait_timeout()).await;
            }
        }

        tracing::info!(session_id = %self.id, command = %plan.command, status = %self.status(), "session started");
        Ok(self.refresh_state().await)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn language(&self) -> Language {
        self.profile.language
    }

    pub fn profile(&self) -> &AdapterProfile {
        &self.profile
    }

    pub fn settings(&self) -> &SessionConfig {
        &self.settings
    }

    pub fn client(&self) -> &DapClient {
        &self.client
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.lock().status
    }

    /// Whether the session reached its terminal state (or its client did).
    pub fn is_terminated(&self) -> bool {
        self.status().is_terminal() || self.client.is_terminated()
    }

    /// Child session ids in registration order.
    pub fn child_session_ids(&self) -> Vec<String> {
        self.inner.lock().children.clone()
    }

    pub(crate) fn add_child(&self, child_id: &str) {
        let mut inner = self.inner.lock();
        if !inner.children.iter().any(|c| c == child_id) {
            inner.children.push(child_id.to_string());
        }
    }

    pub(crate) fn remove_child(&self, child_id: &str) {
        self.inner.lock().children.retain(|c| c != child_id);
    }

    /// Effective capabilities: adapter snapshot plus profile overrides.
    pub fn capabilities(&self) -> CapabilitySet {
        self.profile.resolve(&self.client.capabilities())
    }

    /// Captured output, oldest first.
    pub fn output(&self) -> Vec<OutputRecord> {
        self.output.lock().snapshot()
    }

    /// Captured output, clearing the buffer.
    pub fn take_output(&self) -> Vec<OutputRecord> {
        self.output.lock().drain()
    }

    /// Current state from cached data only.
    pub fn execution_state(&self) -> ExecutionState {
        let has_active_breakpoints = self.breakpoints.lock().has_active();
        let inner = self.inner.lock();
        if inner.status.is_terminal() {
            let mut state = ExecutionState::terminated(self.id.clone(), inner.description.clone());
            state.exit_code = inner.exit_code;
            return state;
        }
        let stop = inner.stop.as_ref();
        ExecutionState {
            session_id: self.id.clone(),
            status: inner.status,
            stop_reason: stop.map(|s| s.reason.clone()),
            thread_id: stop.and_then(|s| s.thread_id),
            location: inner.frame_cache.as_ref().map(|c| Location::from(&c.frame)),
            has_active_breakpoints,
            exit_code: inner.exit_code,
            description: stop
                .and_then(|s| s.description.clone())
                .or_else(|| inner.description.clone()),
        }
    }

    /// Current state, fetching the top frame when paused and not cached.
    pub async fn refresh_state(&self) -> ExecutionState {
        if self.status() == SessionStatus::Paused {
            if let Err(e) = self.top_frame().await {
                tracing::debug!(session_id = %self.id, error = %e, "no top frame for state");
            }
        }
        self.execution_state()
    }

    /// The terminated state, if the session is over.
    pub(crate) fn terminal_state(&self) -> Option<ExecutionState> {
        if !self.is_terminated() {
            return None;
        }
        self.mark_terminated(None);
        Some(self.execution_state())
    }

    /// Enter the terminal state without talking to the adapter.
    pub(crate) fn mark_terminated(&self, description: Option<String>) {
        self.client.mark_terminated();
        let mut inner = self.inner.lock();
        if !inner.status.is_terminal() {
            inner.status = SessionStatus::Terminated;
            inner.frame_cache = None;
            inner.stop = None;
        }
        if description.is_some() && inner.description.is_none() {
            inner.description = description;
        }
    }

    /// Convert a connection-level failure into the terminal state.
    pub(crate) fn terminate_on_failure(&self, error: &DapError) -> ExecutionState {
        tracing::warn!(session_id = %self.id, error = %error, "adapter connection lost");
        self.mark_terminated(Some(error.to_string()));
        self.execution_state()
    }

    pub(crate) fn invalidate_frames(&self) {
        self.inner.lock().frame_cache = None;
    }

    pub(crate) fn set_status(&self, status: SessionStatus) {
        let mut inner = self.inner.lock();
        if !inner.status.is_terminal() {
            inner.status = status;
            if status == SessionStatus::Running {
                inner.stop = None;
                inner.frame_cache = None;
            }
        }
    }

    pub(crate) fn stopped_thread_id(&self) -> Option<i64> {
        self.inner
            .lock()
            .stop
            .as_ref()
            .and_then(|s| s.thread_id)
            .or_else(|| self.client.events().current_thread_id())
    }

    pub(crate) fn invalid_state(&self, operation: &'static str) -> EngineError {
        EngineError::InvalidState {
            session_id: self.id.clone(),
            operation,
            status: self.status(),
        }
    }

    pub(crate) fn require_live(&self) -> Result<(), EngineError> {
        if self.is_terminated() {
            self.mark_terminated(None);
            return Err(EngineError::SessionTerminated(self.id.clone()));
        }
        Ok(())
    }

    pub(crate) fn require_paused(&self, operation: &'static str) -> Result<(), EngineError> {
        self.require_live()?;
        if self.status() != SessionStatus::Paused {
            return Err(self.invalid_state(operation));
        }
        Ok(())
    }

    /// Detach event handlers from the connection.
    pub(crate) fn detach_handlers(&self) {
        let events = self.client.events();
        for id in self.subscriptions.lock().drain(..) {
            events.unsubscribe(id);
        }
        events.set_interceptor(None);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("language", &self.language())
            .field("parent_id", &self.parent_id)
            .field("status", &self.status())
            .finish()
    }
}

/// The most specific error for a launch that never got going.
fn launch_failure(launch: &mut PendingResponse, fallback: DapError) -> EngineError {
    match launch.try_response() {
        Some(Ok(response)) => match response.into_result() {
            Err(rejected) => rejected.into(),
            Ok(_) => fallback.into(),
        },
        Some(Err(e)) => e.into(),
        None => fallback.into(),
    }
}
