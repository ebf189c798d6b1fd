//! Error types for sharevote

use thiserror::Error;
use std::io;

/// Result type alias for sharevote operations
pub type Result<T> = std::result::Result<T, ShareVoteError>;

/// Which entry point a function name was dispatched through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Invocation,
    Query,
}

impl std::fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionKind::Invocation => f.write_str("invocation"),
            FunctionKind::Query => f.write_str("query"),
        }
    }
}

/// Custom error types for sharevote
#[derive(Error, Debug)]
pub enum ShareVoteError {
    #[error("Incorrect number of arguments. Expecting {expected}")]
    IncorrectArguments { expected: usize, got: usize },

    #[error("Received unknown function {kind}: {function}")]
    UnknownFunction { kind: FunctionKind, function: String },

    #[error("{{\"Error\":\"Failed to get state for {key}\"}}")]
    StateRead { key: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Protocol parse error: {0}")]
    Protocol(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("WAL error: {0}")]
    Wal(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for ShareVoteError {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        ShareVoteError::Protocol(format!("Parse error: {:?}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chaincode_error_messages() {
        let err = ShareVoteError::IncorrectArguments { expected: 4, got: 2 };
        assert_eq!(err.to_string(), "Incorrect number of arguments. Expecting 4");

        let err = ShareVoteError::UnknownFunction {
            kind: FunctionKind::Invocation,
            function: "burn".to_string(),
        };
        assert_eq!(err.to_string(), "Received unknown function invocation: burn");

        let err = ShareVoteError::UnknownFunction {
            kind: FunctionKind::Query,
            function: "peek".to_string(),
        };
        assert_eq!(err.to_string(), "Received unknown function query: peek");

        let err = ShareVoteError::StateRead { key: "alice".to_string() };
        assert_eq!(err.to_string(), r#"{"Error":"Failed to get state for alice"}"#);
    }
}
