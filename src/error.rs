//! Error types for the Halberd library.
//!
//! All fallible operations return [`HalberdError`]. Errors raised by a postings
//! collaborator (I/O, decoding, anything wrapped in [`anyhow::Error`]) are
//! propagated unchanged from whichever `next_doc`/`advance`/`next_position`
//! call triggered them. After such an error the iterator is poisoned and
//! keeps returning [`HalberdError::Poisoned`].
//!
//! # Examples
//!
//! ```
//! use halberd::error::{HalberdError, Result};
//!
//! fn build() -> Result<()> {
//!     Err(HalberdError::too_many_clauses(2048, 1024))
//! }
//!
//! match build() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use anyhow;
use thiserror::Error;

/// The main error type for Halberd operations.
#[derive(Error, Debug)]
pub enum HalberdError {
    /// I/O errors surfaced by a postings source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage errors surfaced by a postings source.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The iterator already failed once and refuses to produce more ids.
    #[error("Iterator poisoned: {0}")]
    Poisoned(String),

    /// Combinator construction rejected because of excessive fan-out.
    #[error("Too many clauses: {count} exceeds the maximum of {max}")]
    TooManyClauses {
        /// Number of clauses requested.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Invalid construction argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Errors of arbitrary type raised by collaborators.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with HalberdError.
pub type Result<T> = std::result::Result<T, HalberdError>;

impl HalberdError {
    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        HalberdError::Storage(msg.into())
    }

    /// Create a new poisoned-iterator error.
    pub fn poisoned<S: Into<String>>(msg: S) -> Self {
        HalberdError::Poisoned(msg.into())
    }

    /// Create a new too-many-clauses error.
    pub fn too_many_clauses(count: usize, max: usize) -> Self {
        HalberdError::TooManyClauses { count, max }
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        HalberdError::InvalidArgument(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        HalberdError::Other(format!("Invalid configuration: {}", msg.into()))
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        HalberdError::Other(msg.into())
    }

    /// Whether this error was raised by the storage layer rather than by
    /// the iterator core itself.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            HalberdError::Io(_) | HalberdError::Storage(_) | HalberdError::Anyhow(_)
        )
    }
}
