//! Stepping: `next`, `stepIn` and `stepOut` with granularity translation.

use dapmux_dap::{NextArguments, StepInArguments, StepOutArguments, SteppingGranularity};
use serde_json::Value;

use crate::error::EngineError;
use crate::execution::STOP_EVENTS;
use crate::session::Session;
use crate::state::{ExecutionState, SessionStatus};

/// Direction of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Over,
    Into,
    Out,
}

impl StepKind {
    /// The DAP request for this step.
    pub fn command(self) -> &'static str {
        match self {
            StepKind::Over => "next",
            StepKind::Into => "stepIn",
            StepKind::Out => "stepOut",
        }
    }

    fn operation(self) -> &'static str {
        match self {
            StepKind::Over => "step over",
            StepKind::Into => "step into",
            StepKind::Out => "step out",
        }
    }
}

/// Parse a granularity name. Anything unrecognized means `statement`.
pub fn parse_granularity(raw: Option<&str>) -> SteppingGranularity {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("line") => SteppingGranularity::Line,
        Some("instruction") => SteppingGranularity::Instruction,
        Some("statement") | None => SteppingGranularity::Statement,
        Some(other) => {
            tracing::debug!(granularity = other, "unknown granularity, stepping by statement");
            SteppingGranularity::Statement
        }
    }
}

impl Session {
    pub async fn step_over(
        &self,
        thread_id: Option<i64>,
        granularity: Option<&str>,
    ) -> Result<ExecutionState, EngineError> {
        self.step(StepKind::Over, thread_id, granularity).await
    }

    pub async fn step_into(
        &self,
        thread_id: Option<i64>,
        granularity: Option<&str>,
    ) -> Result<ExecutionState, EngineError> {
        self.step(StepKind::Into, thread_id, granularity).await
    }

    pub async fn step_out(
        &self,
        thread_id: Option<i64>,
        granularity: Option<&str>,
    ) -> Result<ExecutionState, EngineError> {
        self.step(StepKind::Out, thread_id, granularity).await
    }

    /// Step one thread and wait for the resulting stop.
    ///
    /// The returned state carries a freshly fetched top frame.
    pub async fn step(
        &self,
        kind: StepKind,
        thread_id: Option<i64>,
        granularity: Option<&str>,
    ) -> Result<ExecutionState, EngineError> {
        if let Some(state) = self.terminal_state() {
            return Ok(state);
        }
        if self.status() != SessionStatus::Paused {
            return Err(self.invalid_state(kind.operation()));
        }
        let thread_id = match self.resolve_thread(thread_id).await {
            Ok(id) => id,
            Err(EngineError::Dap(e)) if e.is_connection_failure() => {
                return Ok(self.terminate_on_failure(&e));
            }
            Err(e) => return Err(e),
        };
        let granularity = self
            .capabilities()
            .stepping_granularity
            .then(|| parse_granularity(granularity));
        let arguments = step_arguments(kind, thread_id, granularity)
            .map_err(|e| EngineError::validation("granularity", e.to_string()))?;

        let waiter = self.client().events().arm(STOP_EVENTS);
        let previous = self.begin_resume();
        let sent = self
            .client()
            .request::<Option<Value>>(kind.command(), arguments)
            .await;
        if let Err(e) = sent {
            return self.resume_failed(kind.command(), previous, e);
        }
        tracing::debug!(session_id = %self.id(), thread_id, command = kind.command(), "stepped");
        Ok(self
            .await_stop(waiter, self.settings().stop_wait_timeout())
            .await)
    }
}

fn step_arguments(
    kind: StepKind,
    thread_id: i64,
    granularity: Option<SteppingGranularity>,
) -> Result<Value, serde_json::Error> {
    match kind {
        StepKind::Over => serde_json::to_value(NextArguments {
            thread_id,
            granularity,
        }),
        StepKind::Into => serde_json::to_value(StepInArguments {
            thread_id,
            target_id: None,
            granularity,
        }),
        StepKind::Out => serde_json::to_value(StepOutArguments {
            thread_id,
            granularity,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::test_support::detached_session;
    use serde_json::json;

    #[test]
    fn granularity_falls_back_to_statement() {
        assert_eq!(parse_granularity(Some("line")), SteppingGranularity::Line);
        assert_eq!(
            parse_granularity(Some(" Instruction ")),
            SteppingGranularity::Instruction
        );
        assert_eq!(parse_granularity(None), SteppingGranularity::Statement);
        assert_eq!(parse_granularity(Some("word")), SteppingGranularity::Statement);
    }

    #[test]
    fn arguments_omit_missing_granularity() {
        let value = step_arguments(StepKind::Over, 4, None).unwrap();
        assert_eq!(value, json!({"threadId": 4}));

        let value = step_arguments(StepKind::Into, 4, Some(SteppingGranularity::Line)).unwrap();
        assert_eq!(value, json!({"threadId": 4, "granularity": "line"}));
    }

    #[tokio::test]
    async fn stepping_needs_a_pause() {
        let (session, _adapter) = detached_session("python-1", Language::Python);
        session.set_status(SessionStatus::Running);
        let err = session.step_over(None, None).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidState {
                operation: "step over",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn stepping_a_terminated_session_sends_nothing() {
        let (session, _adapter) = detached_session("python-1", Language::Python);
        session.mark_terminated(None);
        for kind in [StepKind::Over, StepKind::Into, StepKind::Out] {
            let state = session.step(kind, Some(1), Some("line")).await.unwrap();
            assert!(state.is_terminated());
        }
        assert_eq!(session.client().pending_count(), 0);
    }
}
