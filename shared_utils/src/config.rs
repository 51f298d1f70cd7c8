use thiserror::Error;

/// Errors raised while reading configuration values from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable is set but its value cannot be parsed.
    #[error("Invalid value for environment variable {name}: {value:?} ({reason})")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Raw value as found in the environment.
        value: String,
        /// Parser message.
        reason: String,
    },
}
