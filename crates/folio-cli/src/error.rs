//! CLI error types.

use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    /// Invalid date format.
    #[error("Invalid date format: {0}. Use YYYY-MM-DD.")]
    InvalidDate(String),

    /// Malformed `KEY=VALUE` argument.
    #[error("Invalid {what}: {input}. Use {expected}.")]
    InvalidPair {
        /// Which argument.
        what: &'static str,
        /// The offending input.
        input: String,
        /// Expected shape.
        expected: &'static str,
    },

    /// Missing required argument.
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    /// Refusing to overwrite a file.
    #[error("{0} already exists. Use --force to overwrite.")]
    FileExists(String),
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;
