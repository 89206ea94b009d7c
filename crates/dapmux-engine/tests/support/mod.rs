//! A scripted in-process debug adapter.
//!
//! The simulated debuggee walks a fixed trace of line numbers in one file.
//! Breakpoints and logpoints are evaluated here, the way a real adapter
//! does. Hit conditions are not: every hit of a plain breakpoint stops.
//! Frame ids are `100 + position in the trace`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use dapmux_dap::transport::{FrameReader, FrameWriter};
use dapmux_dap::Transport;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};

pub const FILE: &str = "/work/app.py";

/// What the fake adapter simulates.
#[derive(Debug, Clone)]
pub struct Script {
    pub trace: Vec<i64>,
    pub capabilities: Value,
    /// Exit once the trace runs out; otherwise keep running until paused.
    pub exit_at_end: bool,
    /// Sent as a `startDebugging` reverse request after launch.
    pub start_debugging: Option<Value>,
}

impl Script {
    /// Lines `1..=last`, executed once each.
    pub fn straight(last: i64) -> Self {
        Self::with_trace((1..=last).collect())
    }

    pub fn with_trace(trace: Vec<i64>) -> Self {
        Self {
            trace,
            capabilities: full_capabilities(),
            exit_at_end: true,
            start_debugging: None,
        }
    }

    /// A debuggee that runs until paused.
    pub fn idle() -> Self {
        Self {
            exit_at_end: false,
            ..Self::with_trace(Vec::new())
        }
    }

    pub fn capabilities(mut self, capabilities: Value) -> Self {
        self.capabilities = capabilities;
        self
    }
}

pub fn full_capabilities() -> Value {
    json!({
        "supportsConfigurationDoneRequest": true,
        "supportsConditionalBreakpoints": true,
        "supportsHitConditionalBreakpoints": true,
        "supportsLogPoints": true,
        "supportsFunctionBreakpoints": true,
        "supportsSteppingGranularity": true,
        "supportsTerminateRequest": true,
        "exceptionBreakpointFilters": [
            {"filter": "raised", "label": "Raised Exceptions"},
            {"filter": "uncaught", "label": "Uncaught Exceptions"}
        ]
    })
}

/// Requests the adapter received, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<Value>>>);

impl RequestLog {
    pub fn commands(&self) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .map(|r| r["command"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Arguments of the last request named `command`.
    pub fn last(&self, command: &str) -> Option<Value> {
        self.0
            .lock()
            .iter()
            .rev()
            .find(|r| r["command"] == command)
            .map(|r| r["arguments"].clone())
    }

    pub fn seqs(&self) -> Vec<i64> {
        self.0
            .lock()
            .iter()
            .filter_map(|r| r["seq"].as_i64())
            .collect()
    }
}

struct FakeBreakpoint {
    id: i64,
    log_message: Option<String>,
    hits: u64,
}

struct Sim<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    script: Script,
    log: RequestLog,
    seq: i64,
    /// Trace position the debuggee is stopped at.
    pos: Option<usize>,
    breakpoints: HashMap<i64, FakeBreakpoint>,
    next_breakpoint_id: i64,
    pending_launch: Option<Value>,
    finished: bool,
}

/// Run a fake adapter on the far end of an in-memory pipe.
pub fn fake_adapter(script: Script) -> (Transport, RequestLog) {
    let (client_io, adapter_io) = tokio::io::duplex(256 * 1024);
    let (cr, cw) = tokio::io::split(client_io);
    let (ar, aw) = tokio::io::split(adapter_io);
    let log = serve(ar, aw, script);
    (Transport::from_streams(cr, cw), log)
}

/// Serve the script over arbitrary streams (a TCP connection, a pipe).
pub fn serve<R, W>(reader: R, writer: W, script: Script) -> RequestLog
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let log = RequestLog::default();
    let sim = Sim {
        reader: FrameReader::new(reader),
        writer: FrameWriter::new(writer),
        script,
        log: log.clone(),
        seq: 0,
        pos: None,
        breakpoints: HashMap::new(),
        next_breakpoint_id: 1,
        pending_launch: None,
        finished: false,
    };
    tokio::spawn(sim.run());
    log
}

impl<R, W> Sim<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn run(mut self) {
        while let Ok(frame) = self.reader.read_frame().await {
            let Ok(message) = serde_json::from_slice::<Value>(&frame) else {
                continue;
            };
            if message["type"] != "request" {
                continue;
            }
            self.log.0.lock().push(message.clone());
            if !self.handle(message).await {
                break;
            }
        }
    }

    async fn send(&mut self, mut message: Value) {
        self.seq += 1;
        message["seq"] = json!(self.seq);
        let body = serde_json::to_vec(&message).unwrap_or_default();
        let _ = self.writer.write_frame(&body).await;
    }

    async fn respond(&mut self, request: &Value, body: Value) {
        self.send(json!({
            "type": "response",
            "request_seq": request["seq"],
            "success": true,
            "command": request["command"],
            "body": body,
        }))
        .await;
    }

    async fn reject(&mut self, request: &Value, message: &str) {
        self.send(json!({
            "type": "response",
            "request_seq": request["seq"],
            "success": false,
            "command": request["command"],
            "message": message,
        }))
        .await;
    }

    async fn event(&mut self, event: &str, body: Value) {
        self.send(json!({"type": "event", "event": event, "body": body}))
            .await;
    }

    /// Returns `false` once the connection should close.
    async fn handle(&mut self, request: Value) -> bool {
        let args = request["arguments"].clone();
        let command = request["command"].as_str().unwrap_or_default().to_string();
        match command.as_str() {
            "initialize" => {
                let caps = self.script.capabilities.clone();
                self.respond(&request, caps).await;
                self.event("initialized", json!({})).await;
            }
            "launch" | "attach" => {
                if self.script.capabilities["supportsConfigurationDoneRequest"] == true {
                    self.pending_launch = Some(request);
                } else {
                    self.respond(&request, json!({})).await;
                    self.resume().await;
                }
            }
            "setBreakpoints" => {
                let requested = args["breakpoints"].as_array().cloned().unwrap_or_default();
                self.breakpoints.clear();
                let mut answered = Vec::new();
                for bp in requested {
                    let line = bp["line"].as_i64().unwrap_or_default();
                    let id = self.next_breakpoint_id;
                    self.next_breakpoint_id += 1;
                    self.breakpoints.insert(
                        line,
                        FakeBreakpoint {
                            id,
                            log_message: bp["logMessage"].as_str().map(str::to_string),
                            hits: 0,
                        },
                    );
                    answered.push(json!({"id": id, "verified": true, "line": line}));
                }
                self.respond(&request, json!({"breakpoints": answered})).await;
            }
            "setFunctionBreakpoints" => {
                let count = args["breakpoints"].as_array().map_or(0, Vec::len);
                let answered: Vec<Value> = (0..count)
                    .map(|i| json!({"id": 500 + i as i64, "verified": true}))
                    .collect();
                self.respond(&request, json!({"breakpoints": answered})).await;
            }
            "setExceptionBreakpoints" => self.respond(&request, json!({})).await,
            "configurationDone" => {
                self.respond(&request, json!({})).await;
                if let Some(launch) = self.pending_launch.take() {
                    self.respond(&launch, json!({})).await;
                }
                if let Some(configuration) = self.script.start_debugging.clone() {
                    self.send(json!({
                        "type": "request",
                        "command": "startDebugging",
                        "arguments": {"configuration": configuration, "request": "attach"},
                    }))
                    .await;
                }
                self.resume().await;
            }
            "continue" => {
                self.respond(&request, json!({"allThreadsContinued": true}))
                    .await;
                self.resume().await;
            }
            "next" | "stepIn" | "stepOut" => {
                self.respond(&request, json!({})).await;
                let next = self.pos.map_or(0, |p| p + 1);
                if next < self.script.trace.len() {
                    self.pos = Some(next);
                    self.event("stopped", json!({"reason": "step", "threadId": 1}))
                        .await;
                } else {
                    self.finish().await;
                }
            }
            "pause" => {
                self.respond(&request, json!({})).await;
                self.event("stopped", json!({"reason": "pause", "threadId": 1}))
                    .await;
            }
            "threads" => {
                self.respond(&request, json!({"threads": [{"id": 1, "name": "MainThread"}]}))
                    .await;
            }
            "stackTrace" => {
                let pos = self.pos.unwrap_or(0);
                let line = self.script.trace.get(pos).copied().unwrap_or(1);
                let frame = json!({
                    "id": 100 + pos as i64,
                    "name": "main",
                    "line": line,
                    "column": 1,
                    "source": {"name": "app.py", "path": FILE},
                });
                self.respond(&request, json!({"stackFrames": [frame], "totalFrames": 1}))
                    .await;
            }
            "scopes" => {
                self.respond(
                    &request,
                    json!({"scopes": [{"name": "Locals", "variablesReference": 7, "expensive": false}]}),
                )
                .await;
            }
            "variables" => {
                let pos = self.pos.unwrap_or(0);
                self.respond(
                    &request,
                    json!({"variables": [{"name": "step", "value": pos.to_string(), "type": "int", "variablesReference": 0}]}),
                )
                .await;
            }
            "evaluate" => {
                let expression = args["expression"].as_str().unwrap_or_default().to_string();
                self.respond(&request, json!({"result": expression, "variablesReference": 0}))
                    .await;
            }
            "terminate" => {
                self.respond(&request, json!({})).await;
                self.finish().await;
            }
            "disconnect" => {
                self.respond(&request, json!({})).await;
                return false;
            }
            other => {
                let message = format!("{other} is not simulated");
                self.reject(&request, &message).await;
            }
        }
        true
    }

    /// Run until the next breakpoint, or the end.
    async fn resume(&mut self) {
        if self.finished {
            return;
        }
        let start = self.pos.map_or(0, |p| p + 1);
        for i in start..self.script.trace.len() {
            let line = self.script.trace[i];
            let Some(bp) = self.breakpoints.get_mut(&line) else {
                continue;
            };
            bp.hits += 1;
            if let Some(message) = bp.log_message.clone() {
                let hits = bp.hits;
                self.event(
                    "output",
                    json!({"category": "console", "output": format!("{message} #{hits}\n"), "line": line}),
                )
                .await;
                continue;
            }
            let id = bp.id;
            self.pos = Some(i);
            self.event(
                "stopped",
                json!({"reason": "breakpoint", "threadId": 1, "hitBreakpointIds": [id]}),
            )
            .await;
            return;
        }
        if self.script.exit_at_end {
            self.finish().await;
        } else {
            self.pos = None;
        }
    }

    async fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.pos = None;
        self.event("exited", json!({"exitCode": 0})).await;
        self.event("terminated", json!({})).await;
    }
}
