//! Reference adapter implementations for infergraph pipelines
//!
//! The core consumes image transformation, model execution and result
//! delivery through narrow traits; this crate provides software
//! implementations of all three, suitable for development, testing and
//! deployments without device acceleration.

pub mod delivery;
pub mod model;
pub mod vision;

// Re-export key types for convenience
pub use delivery::{MemoryDelivery, TensorFileDump};
pub use model::{ConstModel, MeanModel};
pub use vision::NearestScaler;
