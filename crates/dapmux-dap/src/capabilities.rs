//! Flattened view of the adapter's `initialize` response.

use crate::protocol::{Capabilities, ExceptionBreakpointsFilter};

/// What the adapter claims to support. Absent flags read as `false`.
///
/// Set once per connection; the engine layers per-language overrides on top.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DapCapabilities {
    pub supports_configuration_done_request: bool,
    pub supports_conditional_breakpoints: bool,
    pub supports_hit_conditional_breakpoints: bool,
    pub supports_log_points: bool,
    pub supports_function_breakpoints: bool,
    pub supports_data_breakpoints: bool,
    pub supports_stepping_granularity: bool,
    pub supports_terminate_request: bool,
    /// Exception filter ids in advertised order.
    pub exception_filters: Vec<String>,
    /// Filters the adapter marks as on by default.
    pub default_exception_filters: Vec<String>,
}

impl From<&Capabilities> for DapCapabilities {
    fn from(caps: &Capabilities) -> Self {
        let flag = |value: Option<bool>| value.unwrap_or(false);
        let filters: &[ExceptionBreakpointsFilter] =
            caps.exception_breakpoint_filters.as_deref().unwrap_or_default();
        Self {
            supports_configuration_done_request: flag(caps.supports_configuration_done_request),
            supports_conditional_breakpoints: flag(caps.supports_conditional_breakpoints),
            supports_hit_conditional_breakpoints: flag(caps.supports_hit_conditional_breakpoints),
            supports_log_points: flag(caps.supports_log_points),
            supports_function_breakpoints: flag(caps.supports_function_breakpoints),
            supports_data_breakpoints: flag(caps.supports_data_breakpoints),
            supports_stepping_granularity: flag(caps.supports_stepping_granularity),
            supports_terminate_request: flag(caps.supports_terminate_request),
            exception_filters: filters.iter().map(|f| f.filter.clone()).collect(),
            default_exception_filters: filters
                .iter()
                .filter(|f| f.default == Some(true))
                .map(|f| f.filter.clone())
                .collect(),
        }
    }
}

impl DapCapabilities {
    pub fn has_exception_filter(&self, filter: &str) -> bool {
        self.exception_filters.iter().any(|f| f == filter)
    }
}
