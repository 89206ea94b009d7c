//! Debug session engine: sessions over DAP adapter connections, with
//! breakpoints, execution control, stepping, inspection and parent/child
//! session tracking.

pub mod breakpoint;
mod breakpoints;
pub mod bridge;
pub mod engine;
pub mod error;
mod execution;
pub mod hit_condition;
mod inspect;
pub mod language;
pub mod registry;
pub mod session;
pub mod state;
pub mod stepping;

#[cfg(test)]
mod test_support;

pub use breakpoint::{
    Breakpoint, BreakpointSpec, BreakpointStore, FunctionBreakpoint, FunctionBreakpointSpec,
};
pub use bridge::{EventBridge, FORWARDED_EVENTS};
pub use engine::{connect, DebugEngine};
pub use error::EngineError;
pub use hit_condition::{HitCondition, HitOperator};
pub use language::{
    AdapterEndpoint, AdapterProfile, AttachTarget, CapabilitySet, HitConditionSupport, Language,
    LaunchTarget, SessionMode,
};
pub use registry::SessionRegistry;
pub use session::{Session, SessionOptions, SourceBreakpoints};
pub use state::{ExecutionState, Location, OutputRecord, SessionStatus};
pub use stepping::{parse_granularity, StepKind};
