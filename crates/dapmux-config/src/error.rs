use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Malformed TOML, or TOML that does not fit the schema. `origin` is
    /// the file path, or `<inline>` for strings.
    #[error("{origin}: invalid config: {message}")]
    Parse { origin: String, message: String },

    /// A value outside its allowed range.
    #[error("validation error: {field}: {message}")]
    Validation {
        /// Dotted path such as `session.request_timeout_ms`.
        field: String,
        message: String,
    },

    /// Reading or creating a config file or directory failed.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not determine the home directory")]
    NoHomeDir,
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| ConfigError::Io { path, source }
    }

    pub(crate) fn parse(origin: &str) -> impl FnOnce(toml::de::Error) -> Self + '_ {
        move |e| ConfigError::Parse {
            origin: origin.to_string(),
            message: e.message().to_string(),
        }
    }
}
