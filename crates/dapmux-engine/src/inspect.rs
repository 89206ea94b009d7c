//! Read-only inspection of a paused debuggee: threads, frames, scopes,
//! variables and expression evaluation.

use dapmux_dap::{
    EvaluateArguments, EvaluateResponseBody, Scope, ScopesArguments, ScopesResponseBody,
    StackFrame, StackTraceArguments, StackTraceResponseBody, Thread, ThreadsResponseBody,
    Variable, VariablesArguments, VariablesResponseBody,
};

use crate::error::EngineError;
use crate::session::{FrameCache, Session};
use crate::state::SessionStatus;

impl Session {
    /// Threads of the debuggee.
    pub async fn threads(&self) -> Result<Vec<Thread>, EngineError> {
        self.require_live()?;
        let body: ThreadsResponseBody = self
            .client()
            .send_request("threads", None)
            .await?
            .into_result()?
            .parse_body()?;
        Ok(body.threads)
    }

    /// Stack frames of `thread_id`, innermost first. `levels` caps the depth.
    pub async fn stack_trace(
        &self,
        thread_id: Option<i64>,
        levels: Option<i64>,
    ) -> Result<Vec<StackFrame>, EngineError> {
        self.require_paused("read the stack")?;
        let thread_id = self.resolve_thread(thread_id).await?;
        let body: StackTraceResponseBody = self
            .client()
            .request(
                "stackTrace",
                StackTraceArguments {
                    thread_id,
                    start_frame: Some(0),
                    levels,
                },
            )
            .await?;
        Ok(body.stack_frames)
    }

    /// Top frame of the stopped thread, cached until the next resume.
    pub async fn top_frame(&self) -> Result<Option<StackFrame>, EngineError> {
        self.require_paused("read the stack")?;
        let thread_id = self.resolve_thread(None).await?;
        {
            let inner = self.inner.lock();
            if let Some(cache) = &inner.frame_cache {
                if cache.thread_id == thread_id {
                    return Ok(Some(cache.frame.clone()));
                }
            }
        }

        let frame = self
            .stack_trace(Some(thread_id), Some(1))
            .await?
            .into_iter()
            .next();
        if let Some(frame) = &frame {
            let mut inner = self.inner.lock();
            // A resume may have raced the request.
            if inner.status == SessionStatus::Paused {
                inner.frame_cache = Some(FrameCache {
                    thread_id,
                    frame: frame.clone(),
                });
            }
        }
        Ok(frame)
    }

    /// Scopes visible in frame `frame_id`.
    pub async fn scopes(&self, frame_id: i64) -> Result<Vec<Scope>, EngineError> {
        self.require_paused("read scopes")?;
        let body: ScopesResponseBody = self
            .client()
            .request("scopes", ScopesArguments { frame_id })
            .await?;
        Ok(body.scopes)
    }

    /// Children of a scope or structured variable.
    pub async fn variables(&self, variables_reference: i64) -> Result<Vec<Variable>, EngineError> {
        self.require_paused("read variables")?;
        if variables_reference <= 0 {
            return Err(EngineError::validation(
                "variables_reference",
                format!("{variables_reference} does not name a scope or structured value"),
            ));
        }
        let body: VariablesResponseBody = self
            .client()
            .request("variables", VariablesArguments { variables_reference })
            .await?;
        Ok(body.variables)
    }

    /// Evaluate `expression`, in `frame_id` when given.
    ///
    /// `context` is passed through (`watch`, `repl`, `hover`); adapters
    /// default to `repl` when it is absent.
    pub async fn evaluate(
        &self,
        expression: &str,
        frame_id: Option<i64>,
        context: Option<&str>,
    ) -> Result<EvaluateResponseBody, EngineError> {
        self.require_live()?;
        if expression.trim().is_empty() {
            return Err(EngineError::validation("expression", "nothing to evaluate"));
        }
        let frame_id = match frame_id {
            Some(id) => Some(id),
            None if self.status() == SessionStatus::Paused => {
                self.top_frame().await.ok().flatten().map(|f| f.id)
            }
            None => None,
        };
        let body = self
            .client()
            .request(
                "evaluate",
                EvaluateArguments {
                    expression: expression.to_string(),
                    frame_id,
                    context: context.map(str::to_string),
                },
            )
            .await?;
        Ok(body)
    }

    /// The requested thread, else the stopped one, else the first the
    /// adapter reports.
    pub(crate) async fn resolve_thread(&self, requested: Option<i64>) -> Result<i64, EngineError> {
        if let Some(id) = requested.or_else(|| self.stopped_thread_id()) {
            return Ok(id);
        }
        self.threads()
            .await?
            .first()
            .map(|t| t.id)
            .ok_or_else(|| EngineError::validation("thread_id", "the debuggee has no threads"))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::EngineError;
    use crate::language::Language;
    use crate::state::SessionStatus;
    use crate::test_support::detached_session;

    #[tokio::test]
    async fn stack_needs_a_paused_session() {
        let (session, _adapter) = detached_session("python-1", Language::Python);
        session.set_status(SessionStatus::Running);
        let err = session.stack_trace(None, None).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidState {
                operation: "read the stack",
                status: SessionStatus::Running,
                ..
            }
        ));
        assert!(matches!(
            session.scopes(1).await,
            Err(EngineError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn terminated_session_refuses_inspection() {
        let (session, _adapter) = detached_session("python-1", Language::Python);
        session.mark_terminated(None);
        assert!(matches!(
            session.threads().await,
            Err(EngineError::SessionTerminated(_))
        ));
        assert!(matches!(
            session.evaluate("1 + 1", None, None).await,
            Err(EngineError::SessionTerminated(_))
        ));
    }

    #[tokio::test]
    async fn empty_expression_is_rejected() {
        let (session, _adapter) = detached_session("python-1", Language::Python);
        assert!(matches!(
            session.evaluate("  ", None, Some("repl")).await,
            Err(EngineError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn zero_reference_is_rejected() {
        let (session, _adapter) = detached_session("python-1", Language::Python);
        session.set_status(SessionStatus::Paused);
        assert!(matches!(
            session.variables(0).await,
            Err(EngineError::Validation { .. })
        ));
    }
}
