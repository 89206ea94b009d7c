use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Log verbosity level.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Debug messages.
    Debug,
    /// Informational messages (default).
    #[default]
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log verbosity level.
    #[serde(default)]
    pub level: LogLevel,
    /// Optional path to a log file.
    pub file: Option<PathBuf>,
}

/// Timeouts and buffers shared by every debug session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Bound for ordinary DAP requests.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Bound for `terminate` and `disconnect`.
    #[serde(default = "default_terminate_timeout_ms")]
    pub terminate_timeout_ms: u64,
    /// How long continue/step/pause wait for the resulting stop.
    #[serde(default = "default_stop_wait_timeout_ms")]
    pub stop_wait_timeout_ms: u64,
    /// Delay before an adapter-terminated session is unregistered.
    #[serde(default = "default_cleanup_grace_ms")]
    pub cleanup_grace_ms: u64,
    /// Output lines retained per session.
    #[serde(default = "default_output_buffer_lines")]
    pub output_buffer_lines: usize,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_terminate_timeout_ms() -> u64 {
    3_000
}
fn default_stop_wait_timeout_ms() -> u64 {
    5_000
}
fn default_cleanup_grace_ms() -> u64 {
    500
}
fn default_output_buffer_lines() -> usize {
    1_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            terminate_timeout_ms: default_terminate_timeout_ms(),
            stop_wait_timeout_ms: default_stop_wait_timeout_ms(),
            cleanup_grace_ms: default_cleanup_grace_ms(),
            output_buffer_lines: default_output_buffer_lines(),
        }
    }
}

impl SessionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }

    pub fn stop_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_wait_timeout_ms)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }
}

/// Which hit-condition operators an adapter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitConditionMode {
    /// Hit conditions are rejected.
    None,
    /// Only `==N`.
    Exact,
    /// `>`, `>=`, `==` and `%`.
    Full,
}

/// Per-adapter overrides of the capability snapshot.
///
/// Unset fields fall back to what the adapter reports in `initialize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityOverrides {
    pub conditional_breakpoints: Option<bool>,
    pub hit_conditions: Option<HitConditionMode>,
    pub logpoints: Option<bool>,
    pub function_breakpoints: Option<bool>,
    pub data_breakpoints: Option<bool>,
}

/// Connection parameters for one language's debug adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Host the adapter listens on.
    #[serde(default = "default_host")]
    pub host: String,
    /// Default adapter port.
    pub port: u16,
    /// Command for adapters spoken to over stdio instead of TCP.
    pub command: Option<String>,
    /// Arguments for `command`.
    #[serde(default)]
    pub args: Vec<String>,
    /// First port tried when `port` is taken.
    pub fallback_port_start: u16,
    /// Last port tried when `port` is taken.
    pub fallback_port_end: u16,
    /// Overrides `session.terminate_timeout_ms` for this adapter.
    pub terminate_timeout_ms: Option<u64>,
    /// How long a spawned adapter gets to exit before it is killed.
    #[serde(default = "default_process_termination_timeout_ms")]
    pub process_termination_timeout_ms: u64,
    #[serde(default)]
    pub capabilities: CapabilityOverrides,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_process_termination_timeout_ms() -> u64 {
    5_000
}

impl AdapterConfig {
    fn with_ports(port: u16, fallback_port_start: u16, fallback_port_end: u16) -> Self {
        Self {
            host: default_host(),
            port,
            command: None,
            args: Vec::new(),
            fallback_port_start,
            fallback_port_end,
            terminate_timeout_ms: None,
            process_termination_timeout_ms: default_process_termination_timeout_ms(),
            capabilities: CapabilityOverrides::default(),
        }
    }

    pub fn process_termination_timeout(&self) -> Duration {
        Duration::from_millis(self.process_termination_timeout_ms)
    }
}

fn default_python_adapter() -> AdapterConfig {
    AdapterConfig::with_ports(5678, 5679, 5699)
}

fn default_javascript_adapter() -> AdapterConfig {
    AdapterConfig::with_ports(8123, 8124, 8144)
}

fn default_java_adapter() -> AdapterConfig {
    let mut adapter = AdapterConfig::with_ports(5005, 5006, 5026);
    adapter.capabilities.hit_conditions = Some(HitConditionMode::Exact);
    adapter
}

/// Adapter settings keyed by language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptersConfig {
    #[serde(default = "default_python_adapter")]
    pub python: AdapterConfig,
    #[serde(default = "default_javascript_adapter")]
    pub javascript: AdapterConfig,
    #[serde(default = "default_java_adapter")]
    pub java: AdapterConfig,
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            python: default_python_adapter(),
            javascript: default_javascript_adapter(),
            java: default_java_adapter(),
        }
    }
}

/// Top-level dapmux configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
    /// Session timeouts and buffers.
    #[serde(default)]
    pub session: SessionConfig,
    /// Per-language adapter settings.
    #[serde(default)]
    pub adapters: AdaptersConfig,
}
