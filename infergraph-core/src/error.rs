//! Error types for the pipeline substrate

use std::io;
use thiserror::Error;

use crate::message::{PortId, StageId};

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Buffer allocation was refused by the memory pool
    #[error("allocation failed: requested {requested} bytes, available {available} bytes")]
    AllocationFailed {
        /// Requested allocation in bytes
        requested: usize,
        /// Remaining pool capacity in bytes
        available: usize,
    },

    /// Invalid wiring or stage configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed or size-mismatched input message
    #[error("invalid input message: {0}")]
    InvalidInput(String),

    /// The image transform adapter failed for one message
    #[error("transform failed: {0}")]
    Transform(String),

    /// The model execution adapter failed for one message
    #[error("inference failed: {0}")]
    Inference(String),

    /// External adapter failure outside the transform/inference paths
    #[error("adapter error: {0}")]
    Adapter(String),

    /// No wiring entry exists for the named output or input port
    #[error("no wiring entry for stage {stage} port {port}")]
    UnwiredPort {
        /// Stage owning the unresolved port
        stage: StageId,
        /// The unresolved port
        port: PortId,
    },

    /// A port address names a stage the graph does not contain
    #[error("unknown stage {0}")]
    UnknownStage(StageId),

    /// Memory layout error (element size does not divide the payload)
    #[error("memory layout error: {0}")]
    Layout(String),

    /// Operation invoked in an illegal lifecycle state
    #[error("invalid state: {0}")]
    State(String),
}
