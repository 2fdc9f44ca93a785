//! Error types for the Pilum library.
//!
//! All errors are represented by the [`PilumError`] enum. The variants follow
//! the points at which scoring can fail:
//!
//! - configuration problems (unknown column names, malformed aggregation specs)
//!   are detected when a query is constructed,
//! - index-shape problems (a field indexed without positions or payloads) are
//!   detected when a posting cursor is opened,
//! - compilation problems are detected before any document is scored,
//! - script errors are raised per document by the scoring function.
//!
//! # Examples
//!
//! ```
//! use pilum::error::{PilumError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(PilumError::config("unknown column <rank>"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Pilum operations.
#[derive(Error, Debug)]
pub enum PilumError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Query configuration errors (column requests, aggregation specs, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The index does not carry the data a query needs
    #[error("Index error: {0}")]
    Index(String),

    /// Scoring source failed to compile
    #[error("Compile error: {0}")]
    Compile(String),

    /// The scoring function failed while scoring a document
    #[error("Script error: {0}")]
    Script(String),

    /// An operation was attempted in a state that does not allow it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Payload bytes could not be decoded
    #[error("Payload error: {0}")]
    Payload(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with PilumError.
pub type Result<T> = std::result::Result<T, PilumError>;

impl PilumError {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        PilumError::Config(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        PilumError::Index(msg.into())
    }

    /// Create a new compile error.
    pub fn compile<S: Into<String>>(msg: S) -> Self {
        PilumError::Compile(msg.into())
    }

    /// Create a new script error.
    pub fn script<S: Into<String>>(msg: S) -> Self {
        PilumError::Script(msg.into())
    }

    /// Create a new invalid state error.
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        PilumError::InvalidState(msg.into())
    }

    /// Create a new payload error.
    pub fn payload<S: Into<String>>(msg: S) -> Self {
        PilumError::Payload(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PilumError::Other(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        PilumError::Other(format!("Invalid argument: {}", msg.into()))
    }

    /// Returns true for errors that must surface before any document is scored.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            PilumError::Config(_) | PilumError::Index(_) | PilumError::Compile(_)
        )
    }
}
