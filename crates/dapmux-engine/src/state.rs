//! Session status and the normalized execution state handed to callers.

use std::collections::VecDeque;
use std::fmt;

use dapmux_dap::{OutputEventBody, StackFrame, StopReason};
use serde::Serialize;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Handshake in progress.
    Initializing,
    /// The debuggee is executing.
    Running,
    /// The debuggee is stopped.
    Paused,
    /// Terminal; no further requests are sent.
    Terminated,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Initializing => "initializing",
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Terminated => "terminated",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == SessionStatus::Terminated
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source position of a stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: Option<String>,
    pub line: i64,
    pub column: i64,
    pub function: String,
    pub frame_id: i64,
}

impl From<&StackFrame> for Location {
    fn from(frame: &StackFrame) -> Self {
        let file = frame
            .source
            .as_ref()
            .and_then(|s| s.path.clone().or_else(|| s.name.clone()));
        Self {
            file,
            line: frame.line,
            column: frame.column,
            function: frame.name.clone(),
            frame_id: frame.id,
        }
    }
}

/// Normalized run state of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionState {
    pub session_id: String,
    pub status: SessionStatus,
    pub stop_reason: Option<StopReason>,
    pub thread_id: Option<i64>,
    pub location: Option<Location>,
    pub has_active_breakpoints: bool,
    pub exit_code: Option<i64>,
    /// Adapter or engine explanation (stop description, failure cause).
    pub description: Option<String>,
}

impl ExecutionState {
    /// The state reported for a session that has ended.
    pub fn terminated(session_id: impl Into<String>, description: Option<String>) -> Self {
        Self {
            session_id: session_id.into(),
            status: SessionStatus::Terminated,
            stop_reason: None,
            thread_id: None,
            location: None,
            has_active_breakpoints: false,
            exit_code: None,
            description,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.status == SessionStatus::Paused
    }

    pub fn is_terminated(&self) -> bool {
        self.status == SessionStatus::Terminated
    }
}

/// One captured `output` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    pub category: String,
    pub output: String,
    pub file: Option<String>,
    pub line: Option<i64>,
}

impl From<OutputEventBody> for OutputRecord {
    fn from(body: OutputEventBody) -> Self {
        Self {
            category: body.category.unwrap_or_else(|| "console".to_string()),
            output: body.output,
            file: body.source.and_then(|s| s.path.or(s.name)),
            line: body.line,
        }
    }
}

/// Bounded ring of output records; the oldest fall off first.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    records: VecDeque<OutputRecord>,
    capacity: usize,
    dropped: u64,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, record: OutputRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
            self.dropped += 1;
        }
        self.records.push_back(record);
    }

    pub fn snapshot(&self) -> Vec<OutputRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn drain(&mut self) -> Vec<OutputRecord> {
        self.records.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records evicted because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
