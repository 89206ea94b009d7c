use std::path::PathBuf;

use crate::error::ConfigError;

/// Standard dapmux directories under the user's home.
#[derive(Debug, Clone)]
pub struct DefaultPaths {
    home: PathBuf,
}

impl DefaultPaths {
    /// Resolve the home directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoHomeDir` if the home directory cannot be
    /// determined.
    pub fn new() -> Result<Self, ConfigError> {
        let home = dirs::home_dir()
            .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
            .ok_or(ConfigError::NoHomeDir)?;
        Ok(Self { home })
    }

    /// Paths rooted at an explicit home (tests, sandboxes).
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// `~/.config/dapmux`
    pub fn config_dir(&self) -> PathBuf {
        self.home.join(".config").join("dapmux")
    }

    /// `~/.local/share/dapmux`
    pub fn data_dir(&self) -> PathBuf {
        self.home.join(".local").join("share").join("dapmux")
    }

    /// `<data_dir>/logs`
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_hang_off_home() {
        let paths = DefaultPaths::with_home("/home/dev");
        assert_eq!(paths.config_dir(), PathBuf::from("/home/dev/.config/dapmux"));
        assert_eq!(
            paths.log_dir(),
            PathBuf::from("/home/dev/.local/share/dapmux/logs")
        );
    }

    #[test]
    fn new_resolves_some_home() {
        if let Ok(paths) = DefaultPaths::new() {
            assert!(paths.config_dir().ends_with(".config/dapmux"));
        }
    }
}
