//! Error types for name sanitization.

use thiserror::Error;

/// Errors that can occur when sanitizing a repository identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The input contains no character that could survive sanitization.
    #[error("invalid name: '{0}' contains no usable character")]
    InvalidName(String),
}
