use thiserror::Error;

/// Rejections produced while turning a client line into a [`Command`](crate::Command).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("invalid number '{value}' for {field}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid dAv range: {0}")]
    InvalidRange(String),

    #[error("conflicting flags: {0}")]
    ConflictingFlags(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
