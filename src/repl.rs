//! Executes prompt commands against one [`DebugEngine`] and renders the
//! results as single-line JSON.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use dapmux_engine::{
    AttachTarget, DebugEngine, FunctionBreakpointSpec, LaunchTarget, Session, SessionOptions,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::command::{Command, Line, HELP};

/// What the loop should do after a command.
#[derive(Debug, PartialEq)]
pub enum Flow {
    Print(Value),
    Quit,
}

pub struct Repl {
    engine: DebugEngine,
}

impl Repl {
    pub fn new(engine: DebugEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &DebugEngine {
        &self.engine
    }

    pub async fn execute(&self, line: Line) -> Result<Flow> {
        debug!(command = ?line.command, session = ?line.session, "executing");
        let value = match line.command {
            Command::Quit => return Ok(Flow::Quit),
            Command::Help => json!({ "help": HELP }),
            Command::Launch {
                language,
                program,
                args,
                stop_on_entry,
            } => {
                let target = LaunchTarget {
                    program: Some(program),
                    args,
                    cwd: std::env::current_dir().ok(),
                    stop_on_entry,
                    ..Default::default()
                };
                let session = self
                    .engine
                    .start_session(SessionOptions::launch(language, target))
                    .await
                    .with_context(|| format!("failed to launch a {language} session"))?;
                info!(session_id = session.id(), "session launched");
                to_value(session.execution_state())?
            }
            Command::Attach {
                language,
                host,
                port,
            } => {
                let target = AttachTarget {
                    host: host.clone(),
                    port,
                    extra: Map::new(),
                };
                let session = self
                    .engine
                    .start_session(SessionOptions::attach(language, target))
                    .await
                    .with_context(|| format!("failed to attach to {host}:{port}"))?;
                to_value(session.execution_state())?
            }
            Command::Sessions => {
                let default = self.engine.default_session().map(|s| s.id().to_string());
                let sessions: Vec<Value> = self
                    .engine
                    .sessions()
                    .iter()
                    .map(|s| {
                        json!({
                            "id": s.id(),
                            "language": s.language(),
                            "status": s.status(),
                            "parent": s.parent_id(),
                            "default": default.as_deref() == Some(s.id()),
                        })
                    })
                    .collect();
                json!({ "sessions": sessions })
            }
            Command::Use(id) => {
                self.engine.set_default_session(&id)?;
                json!({ "default": id })
            }
            command => {
                let session = self.target(line.session.as_deref())?;
                self.on_session(&session, command).await?
            }
        };
        Ok(Flow::Print(value))
    }

    fn target(&self, id: Option<&str>) -> Result<Arc<Session>> {
        match id {
            Some(id) => Ok(self.engine.session(id)?),
            None => self
                .engine
                .default_session()
                .ok_or_else(|| anyhow!("no active session; `launch` or `attach` first")),
        }
    }

    async fn on_session(&self, session: &Session, command: Command) -> Result<Value> {
        let value = match command {
            Command::Break { file, spec } => {
                let mut specs: Vec<_> = session
                    .breakpoints_in(&file)
                    .iter()
                    .filter(|bp| bp.line != spec.line)
                    .map(|bp| bp.spec())
                    .collect();
                specs.push(spec);
                let placed = session
                    .set_breakpoints(&file, specs)
                    .await
                    .with_context(|| format!("failed to set breakpoints in {}", file.display()))?;
                json!({ "breakpoints": placed })
            }
            Command::Clear { file, line } => {
                let remaining = match line {
                    Some(line) => session.remove_breakpoint_at(&file, line).await?,
                    None => session.set_breakpoints(&file, Vec::new()).await?,
                };
                json!({ "breakpoints": remaining })
            }
            Command::Delete(id) => json!({ "breakpoints": session.remove_breakpoint(id).await? }),
            Command::Breakpoints => json!({
                "breakpoints": session.list_breakpoints(),
                "functionBreakpoints": session.function_breakpoints(),
                "exceptionFilters": session.exception_filters(),
            }),
            Command::FunctionBreak(names) => {
                let specs = names.into_iter().map(FunctionBreakpointSpec::new).collect();
                json!({ "functionBreakpoints": session.set_function_breakpoints(specs).await? })
            }
            Command::Exceptions(filters) => {
                session.set_exception_breakpoints(&filters).await?;
                json!({ "exceptionFilters": session.exception_filters() })
            }
            Command::Continue(thread) => to_value(session.continue_execution(thread).await?)?,
            Command::Pause(thread) => to_value(session.pause(thread).await?)?,
            Command::Step {
                kind,
                thread,
                granularity,
            } => to_value(session.step(kind, thread, granularity.as_deref()).await?)?,
            Command::Wait => to_value(session.wait_for_stop(None).await)?,
            Command::Threads => json!({ "threads": session.threads().await? }),
            Command::Stack(thread) => {
                json!({ "stackFrames": session.stack_trace(thread, None).await? })
            }
            Command::Scopes(frame) => json!({ "scopes": session.scopes(frame).await? }),
            Command::Variables(reference) => {
                json!({ "variables": session.variables(reference).await? })
            }
            Command::Evaluate { expression, frame } => {
                to_value(session.evaluate(&expression, frame, Some("repl")).await?)?
            }
            Command::Output => json!({ "output": session.take_output() }),
            Command::State => to_value(session.refresh_state().await)?,
            Command::Stop => to_value(self.engine.stop_session(session.id()).await?)?,
            Command::Launch { .. }
            | Command::Attach { .. }
            | Command::Sessions
            | Command::Use(_)
            | Command::Help
            | Command::Quit => {
                return Err(anyhow!("command does not take a session target"));
            }
        };
        Ok(value)
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).context("failed to render result")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parse_line;
    use dapmux_config::Config;

    fn repl() -> Repl {
        Repl::new(DebugEngine::new(Config::default()))
    }

    async fn run(repl: &Repl, input: &str) -> Result<Flow> {
        let line = parse_line(input)
            .map_err(|e| anyhow!(e))?
            .ok_or_else(|| anyhow!("empty line"))?;
        repl.execute(line).await
    }

    #[tokio::test]
    async fn quit_ends_the_loop() {
        assert_eq!(run(&repl(), "quit").await.unwrap(), Flow::Quit);
    }

    #[tokio::test]
    async fn sessions_starts_empty() {
        let flow = run(&repl(), "sessions").await.unwrap();
        assert_eq!(flow, Flow::Print(json!({ "sessions": [] })));
    }

    #[tokio::test]
    async fn session_commands_need_a_session() {
        let err = run(&repl(), "continue").await.unwrap_err();
        assert!(err.to_string().contains("no active session"));

        let err = run(&repl(), "@python-9 threads").await.unwrap_err();
        assert!(err.to_string().contains("python-9"));
    }

    #[tokio::test]
    async fn use_rejects_unknown_sessions() {
        assert!(run(&repl(), "use java-1").await.is_err());
    }

    #[tokio::test]
    async fn help_lists_commands() {
        let Flow::Print(value) = run(&repl(), "help").await.unwrap() else {
            panic!("expected output");
        };
        assert!(value["help"].as_str().unwrap().contains("launch"));
    }
}
