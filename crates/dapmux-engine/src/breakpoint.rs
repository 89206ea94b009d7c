//! Per-session breakpoint records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dapmux_dap::BreakpointResponse;
use serde::Serialize;

use crate::hit_condition::HitCondition;

/// A user-level source breakpoint request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointSpec {
    /// Line number (1-based).
    pub line: i64,
    pub condition: Option<String>,
    pub hit_condition: Option<String>,
    /// Presence makes this a logpoint.
    pub log_message: Option<String>,
}

impl BreakpointSpec {
    /// A plain breakpoint at `line`.
    pub fn new(line: i64) -> Self {
        Self {
            line,
            condition: None,
            hit_condition: None,
            log_message: None,
        }
    }

    /// Create a conditional breakpoint.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Create a breakpoint with a hit condition.
    pub fn with_hit_condition(mut self, hit_condition: impl Into<String>) -> Self {
        self.hit_condition = Some(hit_condition.into());
        self
    }

    /// Create a logpoint.
    pub fn with_log_message(mut self, msg: impl Into<String>) -> Self {
        self.log_message = Some(msg.into());
        self
    }

    pub fn is_logpoint(&self) -> bool {
        self.log_message.is_some()
    }
}

/// A breakpoint as tracked by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breakpoint {
    /// Adapter-assigned id, absent until the adapter reports one.
    pub id: Option<i64>,
    pub file: PathBuf,
    /// Requested line.
    pub line: i64,
    /// Line the adapter actually bound to, when it moved it.
    pub actual_line: Option<i64>,
    pub condition: Option<String>,
    pub hit_condition: Option<String>,
    pub log_message: Option<String>,
    pub verified: bool,
    /// Adapter explanation, usually for unverified breakpoints.
    pub message: Option<String>,
    /// Stops attributed to this breakpoint.
    pub hit_count: u64,
}

impl Breakpoint {
    /// Record for `spec`, reconciled with the adapter's answer.
    pub fn from_response(file: &Path, spec: &BreakpointSpec, response: Option<&BreakpointResponse>) -> Self {
        let actual_line = response
            .and_then(|r| r.line)
            .filter(|line| *line != spec.line);
        Self {
            id: response.and_then(|r| r.id),
            file: file.to_path_buf(),
            line: spec.line,
            actual_line,
            condition: spec.condition.clone(),
            hit_condition: spec.hit_condition.clone(),
            log_message: spec.log_message.clone(),
            verified: response.is_some_and(|r| r.verified),
            message: response.and_then(|r| r.message.clone()),
            hit_count: 0,
        }
    }

    pub fn is_logpoint(&self) -> bool {
        self.log_message.is_some()
    }

    /// The spec that reproduces this breakpoint.
    pub fn spec(&self) -> BreakpointSpec {
        BreakpointSpec {
            line: self.line,
            condition: self.condition.clone(),
            hit_condition: self.hit_condition.clone(),
            log_message: self.log_message.clone(),
        }
    }
}

/// A function breakpoint request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionBreakpointSpec {
    pub name: String,
    pub condition: Option<String>,
    pub hit_condition: Option<String>,
}

impl FunctionBreakpointSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: None,
            hit_condition: None,
        }
    }
}

/// A function breakpoint as tracked by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionBreakpoint {
    pub id: Option<i64>,
    pub name: String,
    pub condition: Option<String>,
    pub hit_condition: Option<String>,
    pub verified: bool,
    pub message: Option<String>,
    pub hit_count: u64,
}

/// Whether the `hits`-th hit meets `raw`. Stored conditions were validated
/// when set; anything unparsable pauses.
fn hit_condition_met(raw: Option<&str>, hits: u64) -> bool {
    raw.map_or(true, |raw| {
        HitCondition::parse(raw).map_or(true, |cond| cond.is_satisfied(hits))
    })
}

/// Source, function and exception breakpoints of one session.
///
/// Source breakpoints are keyed by `(file, line)`; each file's entry is
/// replaced wholesale after every `setBreakpoints` round trip.
#[derive(Debug, Clone, Default)]
pub struct BreakpointStore {
    files: BTreeMap<PathBuf, BTreeMap<i64, Breakpoint>>,
    functions: Vec<FunctionBreakpoint>,
    exception_filters: Vec<String>,
}

impl BreakpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every breakpoint of `file`. An empty list clears the file.
    pub fn replace_file(&mut self, file: &Path, breakpoints: Vec<Breakpoint>) {
        if breakpoints.is_empty() {
            self.files.remove(file);
            return;
        }
        let entries = breakpoints.into_iter().map(|bp| (bp.line, bp)).collect();
        self.files.insert(file.to_path_buf(), entries);
    }

    /// Breakpoints of `file`, ordered by line.
    pub fn for_file(&self, file: &Path) -> Vec<Breakpoint> {
        self.files
            .get(file)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every source breakpoint, ordered by file then line.
    pub fn all(&self) -> Vec<Breakpoint> {
        self.files
            .values()
            .flat_map(|entries| entries.values().cloned())
            .collect()
    }

    /// Files that currently carry breakpoints.
    pub fn files(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    pub fn get(&self, file: &Path, line: i64) -> Option<&Breakpoint> {
        self.files.get(file).and_then(|entries| entries.get(&line))
    }

    /// Find a source breakpoint by adapter id.
    pub fn find_by_id(&self, id: i64) -> Option<&Breakpoint> {
        self.files
            .values()
            .flat_map(|entries| entries.values())
            .find(|bp| bp.id == Some(id))
    }

    fn find_by_id_mut(&mut self, id: i64) -> Option<&mut Breakpoint> {
        self.files
            .values_mut()
            .flat_map(|entries| entries.values_mut())
            .find(|bp| bp.id == Some(id))
    }

    /// Apply an adapter `breakpoint` event. Returns `true` if a record changed.
    pub fn apply_event(&mut self, reason: &str, update: &BreakpointResponse) -> bool {
        let Some(id) = update.id else {
            return false;
        };
        if reason == "removed" {
            for entries in self.files.values_mut() {
                entries.retain(|_, bp| bp.id != Some(id));
            }
            self.files.retain(|_, entries| !entries.is_empty());
            return true;
        }
        match self.find_by_id_mut(id) {
            Some(bp) => {
                bp.verified = update.verified;
                if update.message.is_some() {
                    bp.message = update.message.clone();
                }
                if let Some(line) = update.line {
                    bp.actual_line = (line != bp.line).then_some(line);
                }
                true
            }
            None => false,
        }
    }

    /// Count a stop attributed to `ids` and decide whether it should pause.
    ///
    /// The stop is passed over only when every id names a logpoint, or a
    /// breakpoint whose hit condition the new count does not meet. Stops
    /// without ids, or with an id the store does not know, always pause.
    pub fn record_stop(&mut self, ids: &[i64]) -> bool {
        if ids.is_empty() {
            return true;
        }
        let mut pause = false;
        for &id in ids {
            pause |= self.record_hit(id);
        }
        pause
    }

    /// Count one hit of `id`. Returns whether that hit should pause.
    fn record_hit(&mut self, id: i64) -> bool {
        if let Some(bp) = self.find_by_id_mut(id) {
            bp.hit_count += 1;
            return !bp.is_logpoint() && hit_condition_met(bp.hit_condition.as_deref(), bp.hit_count);
        }
        match self.functions.iter_mut().find(|f| f.id == Some(id)) {
            Some(function) => {
                function.hit_count += 1;
                hit_condition_met(function.hit_condition.as_deref(), function.hit_count)
            }
            None => true,
        }
    }

    /// Whether any breakpoint (source or function) is set.
    pub fn has_active(&self) -> bool {
        !self.files.is_empty() || !self.functions.is_empty()
    }

    pub fn replace_functions(&mut self, functions: Vec<FunctionBreakpoint>) {
        self.functions = functions;
    }

    pub fn functions(&self) -> &[FunctionBreakpoint] {
        &self.functions
    }

    pub fn set_exception_filters(&mut self, filters: Vec<String>) {
        self.exception_filters = filters;
    }

    pub fn exception_filters(&self) -> &[String] {
        &self.exception_filters
    }
}
