//! Error types for relq.
//!
//! Two families live here. [`Rejection`] describes a query-string fragment
//! that the compiler dropped; it never escapes [`crate::compile`].
//! [`RelqError`] covers hard failures around the compiler: loading schema
//! files and reading configuration.

use thiserror::Error;

/// Why a fragment of the query string was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Unparseable logical or comparison syntax.
    #[error("Malformed token: '{0}'")]
    MalformedToken(String),

    /// Column, relation or aggregate alias absent from the schema.
    #[error("Unknown identifier: '{0}'")]
    UnknownIdentifier(String),

    /// A pagination value that is not a non-negative integer.
    #[error("Invalid value: '{0}'")]
    InvalidValue(String),

    /// Operator name outside the supported set.
    #[error("Unsupported operator: '{0}'")]
    UnsupportedOperator(String),
}

impl Rejection {
    pub fn malformed(token: impl Into<String>) -> Self {
        Self::MalformedToken(token.into())
    }

    pub fn unknown(ident: impl Into<String>) -> Self {
        Self::UnknownIdentifier(ident.into())
    }

    /// Short machine-readable kind, used in CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedToken(_) => "malformed",
            Self::UnknownIdentifier(_) => "unknown",
            Self::InvalidValue(_) => "invalid",
            Self::UnsupportedOperator(_) => "operator",
        }
    }
}

/// The main error type for relq operations.
#[derive(Debug, Error)]
pub enum RelqError {
    /// Schema definition is inconsistent.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema file is not valid TOML for the expected layout.
    #[error("Schema file error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelqError {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }
}

/// Result type alias for relq operations.
pub type RelqResult<T> = Result<T, RelqError>;
