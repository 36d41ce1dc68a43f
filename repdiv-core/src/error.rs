//! Structured error types for repdiv.

use std::fmt;

use thiserror::Error;

/// Unified error type for all repdiv operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepdivError {
    /// Invalid input (too few groups, empty groups, zero iterations, etc.)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration (unknown correction method, inconsistent
    /// metric sets, thread pool setup)
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RepdivError {
    /// Prefix the message with `context`, keeping the variant.
    ///
    /// ```
    /// use repdiv_core::RepdivError;
    ///
    /// let err = RepdivError::InvalidInput("total count is zero".into())
    ///     .context("group 'b' vs 'a'");
    /// assert_eq!(
    ///     err.to_string(),
    ///     "invalid input: group 'b' vs 'a': total count is zero"
    /// );
    /// ```
    pub fn context(self, context: impl fmt::Display) -> Self {
        match self {
            Self::InvalidInput(msg) => Self::InvalidInput(format!("{context}: {msg}")),
            Self::Configuration(msg) => Self::Configuration(format!("{context}: {msg}")),
        }
    }
}

/// Convenience alias used throughout repdiv.
pub type Result<T> = std::result::Result<T, RepdivError>;
