//! Execution control: continue, pause, stop waits and teardown.
//!
//! Every resuming request arms its `stopped`/`terminated` wait before the
//! request goes out. Connection failures end in the terminated state
//! instead of an error; adapter rejections stay errors.

use std::time::Duration;

use dapmux_dap::{
    ContinueArguments, ContinueResponseBody, DapError, DisconnectArguments, EventWaiter,
    PauseArguments, TerminateArguments, WaitOutcome,
};

use crate::error::EngineError;
use crate::session::{Session, StopInfo};
use crate::state::{ExecutionState, SessionStatus};

/// Events that end a wait for the debuggee to stop.
pub(crate) const STOP_EVENTS: &[&str] = &["stopped", "terminated"];

impl Session {
    /// Resume the debuggee and wait for the next stop.
    ///
    /// Returns `Running` when nothing stops it within the stop-wait bound.
    pub async fn continue_execution(
        &self,
        thread_id: Option<i64>,
    ) -> Result<ExecutionState, EngineError> {
        if let Some(state) = self.terminal_state() {
            return Ok(state);
        }
        if self.status() != SessionStatus::Paused {
            return Err(self.invalid_state("continue"));
        }
        let thread_id = match self.resolve_thread(thread_id).await {
            Ok(id) => id,
            Err(EngineError::Dap(e)) if e.is_connection_failure() => {
                return Ok(self.terminate_on_failure(&e));
            }
            Err(e) => return Err(e),
        };

        let waiter = self.client().events().arm(STOP_EVENTS);
        let previous = self.begin_resume();
        let sent = self
            .client()
            .request::<Option<ContinueResponseBody>>(
                "continue",
                ContinueArguments {
                    thread_id,
                    single_thread: None,
                },
            )
            .await;
        match sent {
            Ok(body) => {
                if body.and_then(|b| b.all_threads_continued) == Some(false) {
                    tracing::debug!(session_id = %self.id(), thread_id, "only one thread resumed");
                }
            }
            Err(e) => return self.resume_failed("continue", previous, e),
        }
        Ok(self.await_stop(waiter, self.settings().stop_wait_timeout()).await)
    }

    /// Interrupt a running debuggee.
    pub async fn pause(&self, thread_id: Option<i64>) -> Result<ExecutionState, EngineError> {
        if let Some(state) = self.terminal_state() {
            return Ok(state);
        }
        if self.status() != SessionStatus::Running {
            return Err(self.invalid_state("pause"));
        }
        let thread_id = match self.resolve_thread(thread_id).await {
            Ok(id) => id,
            Err(EngineError::Dap(e)) if e.is_connection_failure() => {
                return Ok(self.terminate_on_failure(&e));
            }
            Err(e) => return Err(e),
        };

        let waiter = self.client().events().arm(STOP_EVENTS);
        let sent = self
            .client()
            .request::<Option<serde_json::Value>>("pause", PauseArguments { thread_id })
            .await;
        match sent {
            Ok(_) => Ok(self.await_stop(waiter, self.settings().stop_wait_timeout()).await),
            Err(e) if e.is_connection_failure() => Ok(self.terminate_on_failure(&e)),
            Err(e) => Err(e.into()),
        }
    }

    /// Wait until the debuggee stops or terminates.
    ///
    /// Returns immediately when it already has. `None` uses the configured
    /// stop-wait bound.
    pub async fn wait_for_stop(&self, timeout: Option<Duration>) -> ExecutionState {
        let waiter = self.client().events().arm(STOP_EVENTS);
        if let Some(state) = self.terminal_state() {
            return state;
        }
        if self.status() == SessionStatus::Paused {
            return self.refresh_state().await;
        }
        let timeout = timeout.unwrap_or_else(|| self.settings().stop_wait_timeout());
        self.await_stop(waiter, timeout).await
    }

    /// End the debuggee and close the adapter connection.
    ///
    /// Prefers `terminate` when the adapter supports it and falls back to
    /// `disconnect`. Failures are logged; the result is always terminated.
    pub async fn terminate(&self) -> ExecutionState {
        if !self.client().is_terminated() {
            let terminate_timeout = self.client().options().terminate_timeout;
            if self.capabilities().terminate_request {
                let waiter = self.client().events().arm(&["terminated"]);
                let sent = self
                    .client()
                    .request::<Option<serde_json::Value>>(
                        "terminate",
                        TerminateArguments { restart: None },
                    )
                    .await;
                match sent {
                    Ok(_) => {
                        if let WaitOutcome::TimedOut = waiter.wait(terminate_timeout).await {
                            tracing::debug!(session_id = %self.id(), "no terminated event after terminate");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(session_id = %self.id(), error = %e, "terminate request failed")
                    }
                }
            }
            // A `terminated` event closes the client; nothing left to disconnect.
            if !self.client().is_terminated() {
                self.send_disconnect(true).await;
            }
        }
        self.close().await;
        self.execution_state()
    }

    /// Disconnect from the adapter, optionally ending the debuggee.
    pub async fn disconnect(&self, terminate_debuggee: bool) -> ExecutionState {
        if !self.client().is_terminated() {
            self.send_disconnect(terminate_debuggee).await;
        }
        self.close().await;
        self.execution_state()
    }

    async fn send_disconnect(&self, terminate_debuggee: bool) {
        let sent = self
            .client()
            .request::<Option<serde_json::Value>>(
                "disconnect",
                DisconnectArguments {
                    restart: None,
                    terminate_debuggee: Some(terminate_debuggee),
                    suspend_debuggee: None,
                },
            )
            .await;
        if let Err(e) = sent {
            tracing::debug!(session_id = %self.id(), error = %e, "disconnect failed");
        }
    }

    /// Enter the terminal state and release the connection.
    async fn close(&self) {
        self.mark_terminated(None);
        self.client()
            .shutdown(self.profile().process_termination_timeout)
            .await;
        tracing::info!(session_id = %self.id(), "session closed");
    }

    /// Switch to `Running` ahead of a resuming request, returning the
    /// stop it replaces so a rejection can restore it.
    pub(crate) fn begin_resume(&self) -> Option<StopInfo> {
        let previous = self.inner.lock().stop.clone();
        self.set_status(SessionStatus::Running);
        previous
    }

    /// Undo [`begin_resume`](Self::begin_resume) after the request failed.
    pub(crate) fn resume_failed(
        &self,
        command: &str,
        previous: Option<StopInfo>,
        error: DapError,
    ) -> Result<ExecutionState, EngineError> {
        if error.is_connection_failure() {
            return Ok(self.terminate_on_failure(&error));
        }
        {
            let mut inner = self.inner.lock();
            if inner.status == SessionStatus::Running {
                inner.status = SessionStatus::Paused;
                inner.stop = previous;
            }
        }
        tracing::warn!(session_id = %self.id(), command, error = %error, "adapter rejected resume");
        Err(error.into())
    }

    /// Resolve an armed stop wait into the resulting state.
    pub(crate) async fn await_stop(&self, waiter: EventWaiter, timeout: Duration) -> ExecutionState {
        match waiter.wait(timeout).await {
            WaitOutcome::Event(_) => self.refresh_state().await,
            WaitOutcome::TimedOut => {
                tracing::debug!(session_id = %self.id(), ?timeout, "debuggee still running");
                self.execution_state()
            }
            WaitOutcome::Closed => {
                self.mark_terminated(None);
                self.execution_state()
            }
        }
    }
}
