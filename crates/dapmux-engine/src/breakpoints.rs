//! Breakpoint service: validates breakpoint requests against the adapter's
//! capabilities and reconciles the session's store with `setBreakpoints`.

use std::collections::HashSet;
use std::path::Path;

use dapmux_dap::{
    FunctionBreakpoint as DapFunctionBreakpoint, SetBreakpointsArguments,
    SetBreakpointsResponseBody, SetExceptionBreakpointsArguments,
    SetFunctionBreakpointsArguments, Source, SourceBreakpoint,
};

use crate::breakpoint::{Breakpoint, BreakpointSpec, FunctionBreakpoint, FunctionBreakpointSpec};
use crate::error::EngineError;
use crate::hit_condition::HitCondition;
use crate::language::{CapabilitySet, HitConditionSupport};
use crate::session::Session;

impl Session {
    /// Replace every breakpoint in `file` with `specs`.
    ///
    /// Specs are checked before any adapter round trip. An empty list
    /// clears the file. Returns the records in spec order.
    pub async fn set_breakpoints(
        &self,
        file: impl AsRef<Path>,
        specs: Vec<BreakpointSpec>,
    ) -> Result<Vec<Breakpoint>, EngineError> {
        let file = file.as_ref();
        self.require_live()?;
        let _guard = self.breakpoint_updates.lock().await;
        self.apply_file(file, specs).await
    }

    /// All source breakpoints, without contacting the adapter.
    pub fn list_breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.lock().all()
    }

    /// Source breakpoints of one file.
    pub fn breakpoints_in(&self, file: impl AsRef<Path>) -> Vec<Breakpoint> {
        self.breakpoints.lock().for_file(file.as_ref())
    }

    /// Remove the breakpoint with adapter id `id` and re-send its file.
    pub async fn remove_breakpoint(&self, id: i64) -> Result<Vec<Breakpoint>, EngineError> {
        self.require_live()?;
        let _guard = self.breakpoint_updates.lock().await;
        let (file, remaining) = {
            let store = self.breakpoints.lock();
            let target = store
                .find_by_id(id)
                .ok_or_else(|| EngineError::BreakpointNotFound {
                    session_id: self.id().to_string(),
                    target: format!("with id {id}"),
                })?;
            let file = target.file.clone();
            let remaining: Vec<BreakpointSpec> = store
                .for_file(&file)
                .iter()
                .filter(|bp| bp.id != Some(id))
                .map(Breakpoint::spec)
                .collect();
            (file, remaining)
        };
        self.apply_file(&file, remaining).await
    }

    /// Remove the breakpoint at `file:line` and re-send the file.
    pub async fn remove_breakpoint_at(
        &self,
        file: impl AsRef<Path>,
        line: i64,
    ) -> Result<Vec<Breakpoint>, EngineError> {
        let file = file.as_ref();
        self.require_live()?;
        let _guard = self.breakpoint_updates.lock().await;
        let remaining = {
            let store = self.breakpoints.lock();
            if store.get(file, line).is_none() {
                return Err(EngineError::BreakpointNotFound {
                    session_id: self.id().to_string(),
                    target: format!("at {}:{line}", file.display()),
                });
            }
            store
                .for_file(file)
                .iter()
                .filter(|bp| bp.line != line)
                .map(Breakpoint::spec)
                .collect()
        };
        self.apply_file(file, remaining).await
    }

    /// Replace all function breakpoints.
    pub async fn set_function_breakpoints(
        &self,
        specs: Vec<FunctionBreakpointSpec>,
    ) -> Result<Vec<FunctionBreakpoint>, EngineError> {
        self.require_live()?;
        let caps = self.capabilities();
        if !caps.function_breakpoints && !specs.is_empty() {
            return Err(self.unsupported(
                "function breakpoints",
                format!("cannot break on {}", specs[0].name),
            ));
        }

        let mut wire = Vec::with_capacity(specs.len());
        for spec in &specs {
            if spec.name.trim().is_empty() {
                return Err(EngineError::validation(
                    "name",
                    "function breakpoint needs a function name",
                ));
            }
            let place = format!("function {}", spec.name);
            if spec.condition.is_some() && !caps.conditional_breakpoints {
                return Err(self.unsupported("conditional breakpoints", place));
            }
            self.check_hit_condition(spec.hit_condition.as_deref(), &caps, &place)?;
            wire.push(DapFunctionBreakpoint {
                name: spec.name.clone(),
                condition: spec.condition.clone(),
                hit_condition: None,
            });
        }

        let _guard = self.breakpoint_updates.lock().await;
        let body: SetBreakpointsResponseBody = self
            .client()
            .request(
                "setFunctionBreakpoints",
                SetFunctionBreakpointsArguments { breakpoints: wire },
            )
            .await?;

        let records: Vec<FunctionBreakpoint> = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let response = body.breakpoints.get(i);
                FunctionBreakpoint {
                    id: response.and_then(|r| r.id),
                    name: spec.name.clone(),
                    condition: spec.condition.clone(),
                    hit_condition: spec.hit_condition.clone(),
                    verified: response.is_some_and(|r| r.verified),
                    message: response.and_then(|r| r.message.clone()),
                    hit_count: 0,
                }
            })
            .collect();
        self.breakpoints.lock().replace_functions(records.clone());
        tracing::debug!(session_id = %self.id(), count = records.len(), "function breakpoints set");
        Ok(records)
    }

    /// Current function breakpoints.
    pub fn function_breakpoints(&self) -> Vec<FunctionBreakpoint> {
        self.breakpoints.lock().functions().to_vec()
    }

    /// Replace the active exception filters.
    ///
    /// Filters the adapter did not advertise are rejected up front.
    pub async fn set_exception_breakpoints(&self, filters: &[String]) -> Result<(), EngineError> {
        self.require_live()?;
        let caps = self.capabilities();
        if let Some(unknown) = filters.iter().find(|f| !caps.exception_filters.contains(f)) {
            return Err(self.unsupported(
                "exception filter",
                format!(
                    "{unknown:?} is not one of [{}]",
                    caps.exception_filters.join(", ")
                ),
            ));
        }

        let _guard = self.breakpoint_updates.lock().await;
        self.client()
            .send_request(
                "setExceptionBreakpoints",
                Some(serde_json::to_value(SetExceptionBreakpointsArguments {
                    filters: filters.to_vec(),
                })
                .map_err(|e| EngineError::validation("filters", e.to_string()))?),
            )
            .await?
            .into_result()?;
        self.breakpoints
            .lock()
            .set_exception_filters(filters.to_vec());
        Ok(())
    }

    /// Active exception filters.
    pub fn exception_filters(&self) -> Vec<String> {
        self.breakpoints.lock().exception_filters().to_vec()
    }

    /// Validate, send and store one file's breakpoints.
    ///
    /// Callers hold `breakpoint_updates`.
    async fn apply_file(
        &self,
        file: &Path,
        specs: Vec<BreakpointSpec>,
    ) -> Result<Vec<Breakpoint>, EngineError> {
        let wire = self.validate_specs(file, &specs)?;
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        let arguments = SetBreakpointsArguments {
            source: Source {
                name,
                path: Some(file.to_string_lossy().into_owned()),
                source_reference: None,
            },
            breakpoints: Some(wire),
        };

        let body: SetBreakpointsResponseBody =
            self.client().request("setBreakpoints", arguments).await?;
        if body.breakpoints.len() != specs.len() {
            tracing::warn!(
                session_id = %self.id(),
                file = %file.display(),
                sent = specs.len(),
                received = body.breakpoints.len(),
                "adapter answered a different number of breakpoints"
            );
        }

        let records: Vec<Breakpoint> = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| Breakpoint::from_response(file, spec, body.breakpoints.get(i)))
            .collect();
        self.breakpoints.lock().replace_file(file, records.clone());

        let verified = records.iter().filter(|bp| bp.verified).count();
        tracing::info!(
            session_id = %self.id(),
            file = %file.display(),
            total = records.len(),
            verified,
            "breakpoints set"
        );
        Ok(records)
    }

    fn validate_specs(
        &self,
        file: &Path,
        specs: &[BreakpointSpec],
    ) -> Result<Vec<SourceBreakpoint>, EngineError> {
        let caps = self.capabilities();
        let mut seen = HashSet::new();
        let mut wire = Vec::with_capacity(specs.len());

        for spec in specs {
            let place = format!("{}:{}", file.display(), spec.line);
            if spec.line < 1 {
                return Err(EngineError::validation(
                    "line",
                    format!("{place}: lines start at 1"),
                ));
            }
            if !seen.insert(spec.line) {
                return Err(EngineError::validation(
                    "line",
                    format!("{place}: more than one breakpoint on this line"),
                ));
            }
            if spec
                .condition
                .as_deref()
                .is_some_and(|c| c.trim().is_empty())
            {
                return Err(EngineError::validation(
                    "condition",
                    format!("{place}: empty condition"),
                ));
            }
            if spec
                .log_message
                .as_deref()
                .is_some_and(|m| m.trim().is_empty())
            {
                return Err(EngineError::validation(
                    "log_message",
                    format!("{place}: empty log message"),
                ));
            }

            if spec.condition.is_some() && !caps.conditional_breakpoints {
                return Err(self.unsupported("conditional breakpoints", place));
            }
            if spec.log_message.is_some() && !caps.logpoints {
                return Err(self.unsupported("logpoints", place));
            }
            self.check_hit_condition(spec.hit_condition.as_deref(), &caps, &place)?;

            wire.push(SourceBreakpoint {
                line: spec.line,
                column: None,
                condition: spec.condition.clone(),
                hit_condition: None,
                log_message: spec.log_message.clone(),
            });
        }
        Ok(wire)
    }

    /// Parse and capability-check a hit condition.
    ///
    /// Hit conditions never go on the wire: the session counts hits and
    /// resumes stops that do not meet them.
    fn check_hit_condition(
        &self,
        raw: Option<&str>,
        caps: &CapabilitySet,
        place: &str,
    ) -> Result<(), EngineError> {
        let Some(raw) = raw else {
            return Ok(());
        };
        let condition = HitCondition::parse(raw).map_err(|e| match e {
            EngineError::Validation { field, message } => EngineError::Validation {
                field,
                message: format!("{place}: {message}"),
            },
            other => other,
        })?;
        match caps.hit_conditions {
            HitConditionSupport::Unsupported => {
                return Err(self.unsupported("hit conditions", format!("{raw} at {place}")));
            }
            HitConditionSupport::ExactOnly if condition.requires_full_support() => {
                return Err(self.unsupported(
                    "hit conditions",
                    format!("only == is supported (got {raw} at {place})"),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    fn unsupported(&self, capability: &'static str, detail: String) -> EngineError {
        EngineError::UnsupportedCapability {
            session_id: self.id().to_string(),
            capability,
            detail,
        }
    }
}
