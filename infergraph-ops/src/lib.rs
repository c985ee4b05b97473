//! Operator schema registration and shape inference for model builds
//!
//! When a source-framework model is compiled for deployment, each custom
//! operator registers a schema: the attribute set parsed from the
//! framework definition, an output-shape inference function, and the
//! location of its compiled kernel artifacts. Only the registration
//! contract lives here; kernel compilation itself is out of scope.

#![warn(missing_docs)]

pub mod attrs;
pub mod error;
pub mod reduction;
pub mod registry;

// Re-export key types for convenience
pub use attrs::{AttrMap, AttrValue};
pub use error::{Error, Result};
pub use reduction::{ReductionOp, ReductionParam};
pub use registry::{Framework, KernelLocator, OpRegistry, OpSchema};
