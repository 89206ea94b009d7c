use crate::config::{AdapterConfig, Config};
use crate::error::ConfigError;

/// Validate a [`Config`], returning all detected violations.
///
/// Returns `Ok(())` when the config is valid, or `Err` with a
/// vector of every validation error found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let session = &config.session;
    for (field, value) in [
        ("session.request_timeout_ms", session.request_timeout_ms),
        ("session.terminate_timeout_ms", session.terminate_timeout_ms),
        ("session.stop_wait_timeout_ms", session.stop_wait_timeout_ms),
    ] {
        if value == 0 {
            errors.push(invalid(field, "must be greater than 0".to_string()));
        }
    }

    if session.output_buffer_lines == 0 {
        errors.push(invalid(
            "session.output_buffer_lines",
            "must be greater than 0".to_string(),
        ));
    }

    for (name, adapter) in [
        ("python", &config.adapters.python),
        ("javascript", &config.adapters.javascript),
        ("java", &config.adapters.java),
    ] {
        validate_adapter(name, adapter, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_adapter(name: &str, adapter: &AdapterConfig, errors: &mut Vec<ConfigError>) {
    let field = |key: &str| format!("adapters.{name}.{key}");

    if adapter.host.trim().is_empty() {
        errors.push(invalid(&field("host"), "must not be empty".to_string()));
    }
    if adapter.port == 0 {
        errors.push(invalid(&field("port"), "must be 1\u{2013}65535".to_string()));
    }
    if adapter.fallback_port_start == 0 {
        errors.push(invalid(
            &field("fallback_port_start"),
            "must be 1\u{2013}65535".to_string(),
        ));
    }
    if adapter.fallback_port_end < adapter.fallback_port_start {
        errors.push(invalid(
            &field("fallback_port_end"),
            format!(
                "must not be below fallback_port_start ({} < {})",
                adapter.fallback_port_end, adapter.fallback_port_start,
            ),
        ));
    }
    if adapter.terminate_timeout_ms == Some(0) {
        errors.push(invalid(
            &field("terminate_timeout_ms"),
            "must be greater than 0".to_string(),
        ));
    }
    if let Some(command) = &adapter.command {
        if command.trim().is_empty() {
            errors.push(invalid(&field("command"), "must not be empty".to_string()));
        }
    }
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::Validation {
        field: field.to_string(),
        message,
    }
}
