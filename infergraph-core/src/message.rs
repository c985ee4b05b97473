//! Port addressing and the message envelope passed between stages

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buffer::Buffer;

/// Identifier of one graph instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub u32);

/// Identifier of one stage within a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageId(pub u32);

/// Index of a directional port on a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub u32);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph-{}", self.0)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage-{}", self.0)
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port-{}", self.0)
    }
}

/// Stable address of one port endpoint within a running graph
///
/// Unique per `(graph, stage, port)` triple; used both to inject external
/// data and to resolve where an emitted message is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortAddress {
    /// The owning graph instance
    pub graph: GraphId,

    /// The stage the port belongs to
    pub stage: StageId,

    /// The port index on that stage
    pub port: PortId,
}

impl PortAddress {
    /// Create a port address from raw ids
    pub fn new(graph: GraphId, stage: StageId, port: PortId) -> Self {
        Self { graph, stage, port }
    }
}

impl fmt::Display for PortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.graph, self.stage, self.port)
    }
}

/// Well-known message type tags used by the built-in stage variants
pub mod tags {
    /// Raw sensor/media frame as injected by the driver
    pub const FRAME: &str = "frame";

    /// Geometry/format-converted image produced by a transform stage
    pub const IMAGE: &str = "image";

    /// One model output tensor produced by an inference stage
    pub const TENSOR: &str = "tensor";
}

/// One unit of data in flight between stages
///
/// Constructed by the emitting stage, consumed exactly once by the routing
/// layer, then handed to the receiving stage. The type tag lets a receiver
/// reject payloads it does not understand without inspecting bytes; the
/// payload buffer transfers ownership along with the message.
#[derive(Debug)]
pub struct Message {
    /// Tag describing the payload encoding
    type_tag: String,

    /// The owned payload
    payload: Buffer,
}

impl Message {
    /// Create a new message carrying `payload`
    pub fn new(type_tag: impl Into<String>, payload: Buffer) -> Self {
        Self {
            type_tag: type_tag.into(),
            payload,
        }
    }

    /// The payload type tag
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Borrow the payload
    pub fn payload(&self) -> &Buffer {
        &self.payload
    }

    /// Take ownership of the payload
    pub fn into_payload(self) -> Buffer {
        self.payload
    }
}
