//! Supported languages and their adapter profiles.
//!
//! Each language is a closed variant that knows its adapter id, how to
//! phrase launch/attach arguments and which capability overrides apply.

use std::collections::HashMap;
use std::fmt;
use std::net::TcpListener;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dapmux_config::{AdapterConfig, CapabilityOverrides, Config, HitConditionMode};
use dapmux_dap::{DapCapabilities, InitializeRequestArguments};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::EngineError;

/// Debuggee language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Java,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Python, Language::JavaScript, Language::Java];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Java => "java",
        }
    }

    /// `adapterID` sent in `initialize`.
    pub fn adapter_id(self) -> &'static str {
        match self {
            Language::Python => "debugpy",
            Language::JavaScript => "pwa-node",
            Language::Java => "java",
        }
    }

    /// Whether the adapter opens child sessions via `startDebugging`.
    pub fn spawns_child_sessions(self) -> bool {
        matches!(self, Language::JavaScript)
    }

    /// Arguments for the `initialize` request.
    pub fn initialize_arguments(self) -> InitializeRequestArguments {
        let mut args = InitializeRequestArguments::for_adapter(self.adapter_id());
        if self.spawns_child_sessions() {
            args.supports_start_debugging_request = Some(true);
        }
        args
    }

    /// Build the `launch` arguments for `target`.
    pub fn launch_arguments(self, target: &LaunchTarget) -> Result<Value, EngineError> {
        let mut args = Map::new();
        match self {
            Language::Python => {
                match (&target.program, &target.module) {
                    (Some(program), _) => {
                        args.insert("program".into(), json!(program));
                    }
                    (None, Some(module)) => {
                        args.insert("module".into(), json!(module));
                    }
                    (None, None) => {
                        return Err(EngineError::validation(
                            "program",
                            "python launch needs a program or a module",
                        ))
                    }
                }
                args.insert("args".into(), json!(target.args));
                args.insert("justMyCode".into(), json!(target.just_my_code.unwrap_or(true)));
                args.insert("console".into(), json!("internalConsole"));
            }
            Language::JavaScript => {
                let program = target.program.as_ref().ok_or_else(|| {
                    EngineError::validation("program", "javascript launch needs a program")
                })?;
                args.insert("type".into(), json!("pwa-node"));
                args.insert("program".into(), json!(program));
                args.insert("args".into(), json!(target.args));
                args.insert("console".into(), json!("internalConsole"));
            }
            Language::Java => {
                let main_class = target.main_class.as_ref().ok_or_else(|| {
                    EngineError::validation("main_class", "java launch needs a main class")
                })?;
                args.insert("mainClass".into(), json!(main_class));
                if let Some(project) = &target.project_name {
                    args.insert("projectName".into(), json!(project));
                }
                if !target.class_paths.is_empty() {
                    args.insert("classPaths".into(), json!(target.class_paths));
                }
                args.insert("args".into(), json!(target.args.join(" ")));
            }
        }
        args.insert("request".into(), json!("launch"));
        args.insert("stopOnEntry".into(), json!(target.stop_on_entry));
        if let Some(cwd) = &target.cwd {
            args.insert("cwd".into(), json!(cwd));
        }
        if !target.env.is_empty() {
            args.insert("env".into(), json!(target.env));
        }
        args.extend(target.extra.clone());
        Ok(Value::Object(args))
    }

    /// Build the `attach` arguments for `target`.
    pub fn attach_arguments(self, target: &AttachTarget) -> Value {
        let mut args = match self {
            Language::Python => json!({
                "connect": { "host": target.host, "port": target.port },
                "justMyCode": true,
            }),
            Language::JavaScript => json!({
                "type": "pwa-node",
                "address": target.host,
                "port": target.port,
            }),
            Language::Java => json!({
                "hostName": target.host,
                "port": target.port,
            }),
        };
        if let Value::Object(map) = &mut args {
            map.insert("request".into(), json!("attach"));
            map.extend(target.extra.clone());
        }
        args
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" | "typescript" | "ts" | "node" => Ok(Language::JavaScript),
            "java" => Ok(Language::Java),
            other => Err(EngineError::validation(
                "language",
                format!("unsupported language {other:?}"),
            )),
        }
    }
}

/// What to launch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchTarget {
    /// Script or entry file.
    pub program: Option<PathBuf>,
    /// Python module (`python -m`).
    pub module: Option<String>,
    /// Java entry class.
    pub main_class: Option<String>,
    pub project_name: Option<String>,
    pub class_paths: Vec<String>,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub stop_on_entry: bool,
    pub just_my_code: Option<bool>,
    /// Adapter-specific fields merged last.
    pub extra: Map<String, Value>,
}

/// A running debuggee to attach to.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachTarget {
    pub host: String,
    pub port: u16,
    pub extra: Map<String, Value>,
}

/// Launch or attach.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMode {
    Launch(LaunchTarget),
    Attach(AttachTarget),
}

/// How the engine reaches an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEndpoint {
    /// Adapter server listening on TCP.
    Tcp { host: String, port: u16 },
    /// Adapter process spoken to over stdin/stdout.
    Stdio { command: String, args: Vec<String> },
}

/// Which hit-condition operators the adapter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitConditionSupport {
    Unsupported,
    ExactOnly,
    Full,
}

impl From<HitConditionMode> for HitConditionSupport {
    fn from(mode: HitConditionMode) -> Self {
        match mode {
            HitConditionMode::None => HitConditionSupport::Unsupported,
            HitConditionMode::Exact => HitConditionSupport::ExactOnly,
            HitConditionMode::Full => HitConditionSupport::Full,
        }
    }
}

/// Effective feature set: the adapter's `initialize` snapshot with the
/// profile's overrides applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    pub conditional_breakpoints: bool,
    pub hit_conditions: HitConditionSupport,
    pub logpoints: bool,
    pub function_breakpoints: bool,
    pub data_breakpoints: bool,
    pub stepping_granularity: bool,
    pub configuration_done: bool,
    pub terminate_request: bool,
    pub exception_filters: Vec<String>,
}

/// Connection and capability profile for one language's adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterProfile {
    pub language: Language,
    pub host: String,
    pub port: u16,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub fallback_ports: RangeInclusive<u16>,
    pub terminate_timeout: Duration,
    pub process_termination_timeout: Duration,
    pub overrides: CapabilityOverrides,
}

impl AdapterProfile {
    /// Profile built from the defaults of `dapmux-config`.
    pub fn new(language: Language) -> Self {
        Self::from_config(language, &Config::default())
    }

    /// Profile for `language` as configured.
    pub fn from_config(language: Language, config: &Config) -> Self {
        let adapter: &AdapterConfig = match language {
            Language::Python => &config.adapters.python,
            Language::JavaScript => &config.adapters.javascript,
            Language::Java => &config.adapters.java,
        };
        let terminate_timeout = adapter
            .terminate_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.session.terminate_timeout());
        Self {
            language,
            host: adapter.host.clone(),
            port: adapter.port,
            command: adapter.command.clone(),
            args: adapter.args.clone(),
            fallback_ports: adapter.fallback_port_start..=adapter.fallback_port_end,
            terminate_timeout,
            process_termination_timeout: adapter.process_termination_timeout(),
            overrides: adapter.capabilities.clone(),
        }
    }

    /// Where the adapter is reached.
    pub fn endpoint(&self) -> AdapterEndpoint {
        match &self.command {
            Some(command) => AdapterEndpoint::Stdio {
                command: command.clone(),
                args: self.args.clone(),
            },
            None => AdapterEndpoint::Tcp {
                host: self.host.clone(),
                port: self.port,
            },
        }
    }

    /// Apply this profile's overrides to the adapter's snapshot.
    pub fn resolve(&self, caps: &DapCapabilities) -> CapabilitySet {
        let o = &self.overrides;
        let hit_conditions = if caps.supports_hit_conditional_breakpoints {
            o.hit_conditions
                .map(HitConditionSupport::from)
                .unwrap_or(HitConditionSupport::Full)
        } else {
            HitConditionSupport::Unsupported
        };
        CapabilitySet {
            conditional_breakpoints: o
                .conditional_breakpoints
                .unwrap_or(caps.supports_conditional_breakpoints),
            hit_conditions,
            logpoints: o.logpoints.unwrap_or(caps.supports_log_points),
            function_breakpoints: o
                .function_breakpoints
                .unwrap_or(caps.supports_function_breakpoints),
            data_breakpoints: o.data_breakpoints.unwrap_or(caps.supports_data_breakpoints),
            stepping_granularity: caps.supports_stepping_granularity,
            configuration_done: caps.supports_configuration_done_request,
            terminate_request: caps.supports_terminate_request,
            exception_filters: caps.exception_filters.clone(),
        }
    }

    /// The default port if it is free, else the first free fallback port.
    pub fn available_port(&self) -> Option<u16> {
        std::iter::once(self.port)
            .chain(self.fallback_ports.clone())
            .find(|port| port_is_free(&self.host, *port))
    }
}

fn port_is_free(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).is_ok()
}
