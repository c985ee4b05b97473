//! Error types for operator schema handling

use thiserror::Error;

/// Result type for operator schema operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for operator schema operations
#[derive(Error, Debug)]
pub enum Error {
    /// A resolved reduction axis falls outside the input rank
    #[error("invalid axis {axis} for rank {rank}")]
    InvalidAxis {
        /// The axis after negative-axis resolution
        axis: i64,
        /// Rank of the input shape
        rank: usize,
    },

    /// An operator type was registered twice
    #[error("operator {0} is already registered")]
    AlreadyRegistered(String),
}
