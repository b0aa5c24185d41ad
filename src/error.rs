use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the calendar core
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Transport error: {0}")]
    #[diagnostic(code(team_calendar::transport))]
    Transport(String),

    #[error("Decode error: {0}")]
    #[diagnostic(code(team_calendar::decode))]
    Decode(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(team_calendar::not_found))]
    NotFound(String),

    #[error("Validation error: {0}")]
    #[diagnostic(code(team_calendar::validation))]
    Validation(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(team_calendar::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(team_calendar::config))]
    Config(String),

    #[error("Component error: {0}")]
    #[diagnostic(code(team_calendar::component))]
    Component(String),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(team_calendar::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(team_calendar::other))]
    Other(String),
}

impl Error {
    /// Errors that only mean "no data for this slice" while preloading
    pub fn is_recoverable_fetch(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Decode(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type CalendarResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create transport errors
pub fn transport_error(message: &str) -> Error {
    Error::Transport(message.to_string())
}

/// Helper to create decode errors
pub fn decode_error(message: &str) -> Error {
    Error::Decode(message.to_string())
}

/// Helper to create not-found errors
pub fn not_found_error(message: &str) -> Error {
    Error::NotFound(message.to_string())
}

/// Helper to create validation errors
pub fn validation_error(message: &str) -> Error {
    Error::Validation(message.to_string())
}

/// Helper to create component errors
pub fn component_error(message: &str) -> Error {
    Error::Component(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions_keep_their_kind() {
        let json = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(Error::from(json), Error::Serialization(_)));

        let toml = toml::from_str::<std::collections::HashMap<String, bool>>("a = 1").unwrap_err();
        assert!(matches!(Error::from(toml), Error::Config(_)));
    }

    #[test]
    fn test_only_fetch_failures_are_recoverable() {
        assert!(transport_error("timeout").is_recoverable_fetch());
        assert!(decode_error("bad json").is_recoverable_fetch());
        assert!(!not_found_error("team").is_recoverable_fetch());
        assert!(!validation_error("title").is_recoverable_fetch());
        assert!(!component_error("mailbox").is_recoverable_fetch());
    }
}
