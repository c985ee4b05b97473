//! Seams for the external processing capabilities consumed by stages
//!
//! The pipeline core never performs image geometry work, model execution,
//! or result delivery itself; stages invoke these narrow traits and route
//! whatever comes back. Concrete implementations live outside the core
//! (see the `infergraph-adapters` crate).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::buffer::Buffer;
use crate::config::{RunContext, StageConfig};
use crate::error::{Error, Result};
use crate::message::Message;

/// Pixel layout of an image payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Planar luma followed by interleaved half-resolution chroma
    Yuv420SemiPlanar,

    /// Packed 8-bit RGB triplets
    Rgb888,
}

impl PixelFormat {
    /// Bytes needed for a frame with the given stride geometry
    pub fn frame_len(self, width_stride: u32, height_stride: u32) -> usize {
        let pixels = width_stride as usize * height_stride as usize;
        match self {
            PixelFormat::Yuv420SemiPlanar => pixels * 3 / 2,
            PixelFormat::Rgb888 => pixels * 3,
        }
    }
}

/// Rectangular pixel region with inclusive offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Leftmost column
    pub left: u32,
    /// Rightmost column, inclusive
    pub right: u32,
    /// Topmost row
    pub top: u32,
    /// Bottom row, inclusive
    pub bottom: u32,
}

impl Region {
    /// Region covering a full `width x height` frame
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            right: width.saturating_sub(1),
            top: 0,
            bottom: height.saturating_sub(1),
        }
    }

    /// Width of the region in pixels
    pub fn width(&self) -> u32 {
        self.right - self.left + 1
    }

    /// Height of the region in pixels
    pub fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }
}

/// One side of a transform: a region within a strided image plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiSpec {
    /// The active pixel region
    pub region: Region,

    /// Row stride of the backing image in pixels
    pub width_stride: u32,

    /// Number of rows in the backing image
    pub height_stride: u32,
}

impl RoiSpec {
    /// Buffer length implied by the stride geometry for `format`
    pub fn buffer_len(&self, format: PixelFormat) -> usize {
        format.frame_len(self.width_stride, self.height_stride)
    }

    /// Check that the region lies within the strided plane
    pub fn validate(&self) -> Result<()> {
        if self.region.left > self.region.right || self.region.top > self.region.bottom {
            return Err(Error::Config(format!(
                "degenerate region {:?}",
                self.region
            )));
        }
        if self.region.right >= self.width_stride || self.region.bottom >= self.height_stride {
            return Err(Error::Config(format!(
                "region {:?} exceeds {}x{} plane",
                self.region, self.width_stride, self.height_stride
            )));
        }
        Ok(())
    }
}

/// Fixed geometry a transform stage applies to every message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformPlan {
    /// Source region and strides
    pub source: RoiSpec,

    /// Destination region and strides
    pub dest: RoiSpec,

    /// Pixel format of inbound payloads
    pub input_format: PixelFormat,

    /// Pixel format of produced payloads
    pub output_format: PixelFormat,
}

impl TransformPlan {
    /// Exact payload length the plan accepts
    pub fn expected_input_len(&self) -> usize {
        self.source.buffer_len(self.input_format)
    }

    /// Payload length the plan produces
    pub fn output_len(&self) -> usize {
        self.dest.buffer_len(self.output_format)
    }
}

/// Dimensions of a tensor payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorShape(Vec<usize>);

impl TensorShape {
    /// Create a shape from its dimension extents
    pub fn new(dims: Vec<usize>) -> Self {
        Self(dims)
    }

    /// The dimension extents
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements
    pub fn num_elements(&self) -> usize {
        self.0.iter().product()
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", dims.join("x"))
    }
}

/// Description of one model output tensor, produced before execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDesc {
    /// Tensor dimensions
    pub shape: TensorShape,

    /// Size of one element in bytes
    pub elem_size: usize,
}

impl TensorDesc {
    /// Describe a tensor of 32-bit float elements
    pub fn f32(shape: TensorShape) -> Self {
        Self {
            shape,
            elem_size: std::mem::size_of::<f32>(),
        }
    }

    /// Buffer length needed to hold the tensor
    pub fn byte_len(&self) -> usize {
        self.shape.num_elements() * self.elem_size
    }
}

/// Geometry/format conversion capability consumed by transform stages
///
/// The adapter owns the conversion between the fixed source and destination
/// descriptors; it allocates and returns the output buffer. Failures leave
/// no output behind.
pub trait ImageTransform: Send {
    /// One-time setup from the stage configuration
    fn init(&mut self, _config: &StageConfig) -> Result<()> {
        Ok(())
    }

    /// Convert `input` from the source descriptor into a new buffer laid
    /// out per the destination descriptor
    fn apply(
        &self,
        input: &Buffer,
        source: &RoiSpec,
        dest: &RoiSpec,
        input_format: PixelFormat,
        output_format: PixelFormat,
    ) -> Result<Buffer>;
}

/// Model execution capability consumed by inference stages
pub trait ModelRunner: Send {
    /// One-time setup, e.g. loading model weights named by the config
    fn init(&mut self, _config: &StageConfig) -> Result<()> {
        Ok(())
    }

    /// Describe the output tensors a run over `inputs` will produce
    fn prepare_outputs(&self, inputs: &[Buffer]) -> Result<Vec<TensorDesc>>;

    /// Execute the model, filling the pre-allocated `outputs` in order
    ///
    /// `outputs` matches the descriptors returned by
    /// [`ModelRunner::prepare_outputs`], one buffer per descriptor.
    fn run(
        &self,
        ctx: &RunContext,
        inputs: &[Buffer],
        outputs: &mut [Buffer],
        timeout_hint: Option<Duration>,
    ) -> Result<()>;
}

/// Side-effecting delivery capability consumed by sink stages
pub trait Delivery: Send {
    /// Persist or hand off one delivered message
    fn deliver(&mut self, message: &Message) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(PixelFormat::Yuv420SemiPlanar, 1024, 684, 1_050_624 ; "camera frame")]
    #[test_case(PixelFormat::Yuv420SemiPlanar, 224, 224, 75_264 ; "network input")]
    #[test_case(PixelFormat::Rgb888, 4, 4, 48 ; "packed rgb")]
    fn test_frame_len_by_format(format: PixelFormat, width: u32, height: u32, expected: usize) {
        assert_eq!(format.frame_len(width, height), expected);
    }

    #[test]
    fn test_region_extents() {
        let region = Region::full(224, 224);
        assert_eq!((region.left, region.right), (0, 223));
        assert_eq!(region.width(), 224);
        assert_eq!(region.height(), 224);
    }

    #[test]
    fn test_roi_validation() {
        let roi = RoiSpec {
            region: Region::full(1024, 684),
            width_stride: 1024,
            height_stride: 684,
        };
        assert!(roi.validate().is_ok());

        let out_of_plane = RoiSpec {
            region: Region {
                left: 0,
                right: 1024,
                top: 0,
                bottom: 683,
            },
            width_stride: 1024,
            height_stride: 684,
        };
        assert!(out_of_plane.validate().is_err());
    }

    #[test]
    fn test_shape_display_and_len() {
        let shape = TensorShape::new(vec![1, 1, 7, 9]);
        assert_eq!(shape.to_string(), "[1x1x7x9]");
        assert_eq!(shape.num_elements(), 63);
        assert_eq!(TensorDesc::f32(shape).byte_len(), 252);
    }
}
