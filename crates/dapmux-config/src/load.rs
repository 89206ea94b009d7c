use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::merge_configs;
use crate::validate::validate;

/// Content written into a newly-created default config file.
const DEFAULT_CONFIG_CONTENT: &str = r#"# dapmux configuration
# Uncomment and edit settings below to override defaults.

# [log]
# level = "info"

# [session]
# request_timeout_ms = 10000
# terminate_timeout_ms = 3000
# stop_wait_timeout_ms = 5000
# cleanup_grace_ms = 500
# output_buffer_lines = 1000

# [adapters.python]
# host = "127.0.0.1"
# port = 5678
# command = "python3"
# args = ["-m", "debugpy.adapter"]

# [adapters.javascript]
# port = 8123

# [adapters.java]
# port = 5005
# [adapters.java.capabilities]
# hit_conditions = "exact"
"#;

const PROJECT_CONFIG_DIR: &str = ".dapmux";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Build the effective configuration.
///
/// Layers, later wins: built-in defaults, `config_dir/config.toml`
/// (written with commented-out defaults when missing), then the nearest
/// `.dapmux/config.toml` at or above `project_dir`. The merged result is
/// validated and the first violation returned.
pub fn load_config(config_dir: &Path, project_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let mut layers = vec![ensure_global_config(config_dir)?];
    layers.extend(project_dir.and_then(find_project_config));

    let mut config = Config::default();
    for path in &layers {
        let content = fs::read_to_string(path).map_err(ConfigError::io(path))?;
        if !has_settings(&content) {
            continue;
        }
        debug!(path = %path.display(), "applying config layer");
        config = merge_configs(&config, &content, &path.display().to_string())?;
    }
    checked(config)
}

/// Parse and validate a complete TOML document.
pub fn load_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml_str).map_err(ConfigError::parse("<inline>"))?;
    checked(config)
}

fn ensure_global_config(config_dir: &Path) -> Result<PathBuf, ConfigError> {
    let path = config_dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        fs::create_dir_all(config_dir).map_err(ConfigError::io(config_dir))?;
        fs::write(&path, DEFAULT_CONFIG_CONTENT).map_err(ConfigError::io(&path))?;
        info!(path = %path.display(), "created default config");
    }
    Ok(path)
}

/// Nearest `.dapmux/config.toml` at or above `start`.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// A file holding only comments and blank lines changes nothing.
fn has_settings(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .any(|l| !l.is_empty() && !l.starts_with('#'))
}

fn checked(config: Config) -> Result<Config, ConfigError> {
    match validate(&config) {
        Err(mut violations) if !violations.is_empty() => Err(violations.swap_remove(0)),
        _ => Ok(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_config_creates_default_when_missing() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");

        let config = load_config(&cfg_dir, None).unwrap();
        assert_eq!(config, Config::default());
        assert!(cfg_dir.join("config.toml").exists());
    }

    #[test]
    fn load_config_reads_existing_global() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[session]\nrequest_timeout_ms = 2500\n",
        )
        .unwrap();

        let config = load_config(&cfg_dir, None).unwrap();
        assert_eq!(config.session.request_timeout_ms, 2500);
        assert_eq!(config.session.terminate_timeout_ms, 3_000);
    }

    #[test]
    fn load_config_merges_project_over_global() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[adapters.python]\nport = 6000\n",
        )
        .unwrap();

        let proj_dir = tmp.path().join("project");
        let dot_dir = proj_dir.join(PROJECT_CONFIG_DIR);
        std::fs::create_dir_all(&dot_dir).unwrap();
        std::fs::write(dot_dir.join("config.toml"), "[adapters.python]\nport = 6001\n").unwrap();

        let config = load_config(&cfg_dir, Some(&proj_dir)).unwrap();
        assert_eq!(config.adapters.python.port, 6001);
    }

    #[test]
    fn load_config_rejects_invalid_merged_values() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[session]\nstop_wait_timeout_ms = 0\n",
        )
        .unwrap();

        match load_config(&cfg_dir, None) {
            Err(ConfigError::Validation { field, .. }) => {
                assert_eq!(field, "session.stop_wait_timeout_ms")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn load_from_str_parses_valid_toml() {
        let config = load_from_str("[session]\ncleanup_grace_ms = 10\n").unwrap();
        assert_eq!(config.session.cleanup_grace_ms, 10);
    }

    #[test]
    fn load_from_str_rejects_invalid_toml() {
        assert!(matches!(
            load_from_str("{{bad}}"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn find_project_config_walks_up() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        let dot_dir = root.join(PROJECT_CONFIG_DIR);
        std::fs::create_dir_all(&dot_dir).unwrap();
        std::fs::write(dot_dir.join("config.toml"), "[log]\nlevel = \"debug\"\n").unwrap();

        let deep = root.join("src").join("module");
        std::fs::create_dir_all(&deep).unwrap();

        let found = find_project_config(&deep).expect("project config");
        assert!(found.ends_with(".dapmux/config.toml"));
    }

    #[test]
    fn default_config_content_is_comment_only() {
        assert!(!has_settings(DEFAULT_CONFIG_CONTENT));
    }

    #[test]
    fn has_settings_ignores_comments() {
        assert!(!has_settings(""));
        assert!(!has_settings("  # comment\n\n"));
        assert!(has_settings("# comment\n[log]\n"));
    }

    #[test]
    fn project_parse_errors_name_the_file() {
        let tmp = TempDir::new().unwrap();
        let proj_dir = tmp.path().join("project");
        let dot_dir = proj_dir.join(PROJECT_CONFIG_DIR);
        std::fs::create_dir_all(&dot_dir).unwrap();
        std::fs::write(dot_dir.join("config.toml"), "[session\n").unwrap();

        match load_config(&tmp.path().join("config"), Some(&proj_dir)) {
            Err(ConfigError::Parse { origin, .. }) => {
                assert!(origin.ends_with(".dapmux/config.toml"), "{origin}")
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }
}
