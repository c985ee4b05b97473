//! Core substrate for fixed-topology streaming inference pipelines
//!
//! This crate provides the pipeline's concurrency and resource discipline:
//! stage lifecycle, port-addressed asynchronous message passing, buffer
//! ownership transfer across stage boundaries, and the run-scoped
//! completion signal an external driver waits on. Concrete image-transform,
//! model-execution and delivery capabilities plug in through the traits in
//! [`adapter`].

#![warn(missing_docs)]

pub mod adapter;
pub mod buffer;
pub mod completion;
pub mod config;
pub mod error;
pub mod graph;
pub mod memory;
pub mod message;
pub mod stage;

// Re-export key types for convenience
pub use adapter::{
    Delivery, ImageTransform, ModelRunner, PixelFormat, Region, RoiSpec, TensorDesc, TensorShape,
    TransformPlan,
};
pub use buffer::Buffer;
pub use completion::{CompletionSignal, CompletionStatus};
pub use config::{RunContext, StageConfig};
pub use error::{Error, Result};
pub use graph::{Graph, StageBindings, StageSpec, Wire, WiringSpec};
pub use memory::MemoryPool;
pub use message::{GraphId, Message, PortAddress, PortId, StageId};
pub use stage::{Emitter, PipelineStage, StageBinding, StageRole, StageState};

// The routing layer moves stages and messages across threads.
static_assertions::assert_impl_all!(Buffer: Send, Sync);
static_assertions::assert_impl_all!(Message: Send);
static_assertions::assert_impl_all!(CompletionSignal: Send, Sync);
static_assertions::assert_impl_all!(PipelineStage: Send);
