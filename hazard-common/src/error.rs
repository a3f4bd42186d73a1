//! Common error types for hazard calculations

use thiserror::Error;

/// Common result type for hazard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the hazard crates
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid calculation parameters or logic tree definitions.
    ///
    /// Always fatal and reported before any work is dispatched.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A worker block failed; raised after every other block completed
    #[error("Block {block} failed ({failed_blocks} failed block(s) in total): {message}")]
    BlockComputation {
        /// Identifier of the lowest-numbered failing block
        block: String,
        /// Number of blocks that failed in the same map phase
        failed_blocks: usize,
        /// Error reported by the worker
        message: String,
    },

    /// Ground shaking intensity model failure
    #[error("GSIM error: {0}")]
    Gsim(String),

    /// Invalid source, site or curve input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Calculation abandoned through its cancellation token
    #[error("Calculation cancelled")]
    Cancelled,

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// True for errors that abort a calculation regardless of retries
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::TomlParse(_))
    }
}
