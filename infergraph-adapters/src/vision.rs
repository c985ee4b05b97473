//! Software planar-YUV crop and resize
//!
//! Stands in for a hardware image codec behind the [`ImageTransform`]
//! seam: crops the source region out of a strided semi-planar frame and
//! nearest-neighbour scales it into the destination region.

use std::sync::Arc;

use infergraph_core::adapter::{ImageTransform, PixelFormat, RoiSpec};
use infergraph_core::buffer::Buffer;
use infergraph_core::error::{Error, Result};
use infergraph_core::memory::MemoryPool;

/// Nearest-neighbour crop/resize for YUV420 semi-planar frames
pub struct NearestScaler {
    /// Pool charged for output frames
    pool: Arc<MemoryPool>,
}

impl NearestScaler {
    /// Create a scaler allocating output frames from `pool`
    pub fn new(pool: Arc<MemoryPool>) -> Self {
        Self { pool }
    }
}

impl ImageTransform for NearestScaler {
    fn apply(
        &self,
        input: &Buffer,
        source: &RoiSpec,
        dest: &RoiSpec,
        input_format: PixelFormat,
        output_format: PixelFormat,
    ) -> Result<Buffer> {
        if input_format != PixelFormat::Yuv420SemiPlanar
            || output_format != PixelFormat::Yuv420SemiPlanar
        {
            return Err(Error::Adapter(format!(
                "unsupported conversion {input_format:?} -> {output_format:?}"
            )));
        }
        source.validate()?;
        dest.validate()?;

        let expected = source.buffer_len(input_format);
        if input.len() != expected {
            return Err(Error::InvalidInput(format!(
                "input frame is {} bytes, source geometry needs {expected}",
                input.len()
            )));
        }

        let mut output = Buffer::allocate(dest.buffer_len(output_format), &self.pool)?;
        scale_luma(input.as_slice(), source, output.as_mut_slice(), dest);
        scale_chroma(input.as_slice(), source, output.as_mut_slice(), dest);

        tracing::debug!(
            src_w = source.region.width(),
            src_h = source.region.height(),
            dst_w = dest.region.width(),
            dst_h = dest.region.height(),
            "frame scaled"
        );
        Ok(output)
    }
}

fn scale_luma(src: &[u8], s: &RoiSpec, dst: &mut [u8], d: &RoiSpec) {
    let (sw, sh) = (s.region.width() as usize, s.region.height() as usize);
    let (dw, dh) = (d.region.width() as usize, d.region.height() as usize);
    let s_stride = s.width_stride as usize;
    let d_stride = d.width_stride as usize;

    for dy in 0..dh {
        let sy = s.region.top as usize + dy * sh / dh;
        let out_row = (d.region.top as usize + dy) * d_stride;
        for dx in 0..dw {
            let sx = s.region.left as usize + dx * sw / dw;
            dst[out_row + d.region.left as usize + dx] = src[sy * s_stride + sx];
        }
    }
}

// Chroma samples sit at half resolution with interleaved U/V pairs, in a
// plane following the luma rows. Region origins round down to the even
// sample grid.
fn scale_chroma(src: &[u8], s: &RoiSpec, dst: &mut [u8], d: &RoiSpec) {
    let s_stride = s.width_stride as usize;
    let d_stride = d.width_stride as usize;
    let s_plane = s_stride * s.height_stride as usize;
    let d_plane = d_stride * d.height_stride as usize;

    let half = |extent: usize| extent.div_ceil(2);
    let (sw, sh) = (
        half(s.region.width() as usize),
        half(s.region.height() as usize),
    );
    let (dw, dh) = (
        half(d.region.width() as usize),
        half(d.region.height() as usize),
    );

    for dy in 0..dh {
        let sy = s.region.top as usize / 2 + dy * sh / dh;
        let out_row = d_plane + (d.region.top as usize / 2 + dy) * d_stride;
        for dx in 0..dw {
            let sx = s.region.left as usize / 2 + dx * sw / dw;
            let src_at = s_plane + sy * s_stride + sx * 2;
            let dst_at = out_row + (d.region.left as usize / 2 + dx) * 2;
            dst[dst_at] = src[src_at];
            dst[dst_at + 1] = src[src_at + 1];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infergraph_core::adapter::Region;

    fn full_roi(width: u32, height: u32) -> RoiSpec {
        RoiSpec {
            region: Region::full(width, height),
            width_stride: width,
            height_stride: height,
        }
    }

    fn scaler() -> NearestScaler {
        NearestScaler::new(Arc::new(MemoryPool::unbounded()))
    }

    #[test]
    fn test_identity_geometry_copies_the_frame() {
        let frame: Vec<u8> = (0..24).collect();
        let roi = full_roi(4, 4);

        let out = scaler()
            .apply(
                &Buffer::from_vec(frame.clone()),
                &roi,
                &roi,
                PixelFormat::Yuv420SemiPlanar,
                PixelFormat::Yuv420SemiPlanar,
            )
            .unwrap();

        assert_eq!(out.as_slice(), frame.as_slice());
    }

    #[test]
    fn test_downscale_samples_nearest_pixels() {
        // 4x4 frame: luma 0..16, chroma 16..24.
        let frame: Vec<u8> = (0..24).collect();

        let out = scaler()
            .apply(
                &Buffer::from_vec(frame),
                &full_roi(4, 4),
                &full_roi(2, 2),
                PixelFormat::Yuv420SemiPlanar,
                PixelFormat::Yuv420SemiPlanar,
            )
            .unwrap();

        // Luma picks every other row and column; chroma keeps the first pair.
        assert_eq!(out.as_slice(), &[0, 2, 8, 10, 16, 17]);
    }

    #[test]
    fn test_crop_without_scaling() {
        let mut frame = vec![0u8; 24];
        // Bottom-right 2x2 luma block of a 4x4 frame.
        frame[2 * 4 + 2] = 90;
        frame[2 * 4 + 3] = 91;
        frame[3 * 4 + 2] = 92;
        frame[3 * 4 + 3] = 93;
        // Its chroma pair.
        frame[16 + 4 + 2] = 70;
        frame[16 + 4 + 3] = 71;

        let source = RoiSpec {
            region: Region {
                left: 2,
                right: 3,
                top: 2,
                bottom: 3,
            },
            width_stride: 4,
            height_stride: 4,
        };

        let out = scaler()
            .apply(
                &Buffer::from_vec(frame),
                &source,
                &full_roi(2, 2),
                PixelFormat::Yuv420SemiPlanar,
                PixelFormat::Yuv420SemiPlanar,
            )
            .unwrap();

        assert_eq!(out.as_slice(), &[90, 91, 92, 93, 70, 71]);
    }

    #[test]
    fn test_rejects_format_conversion() {
        let err = scaler()
            .apply(
                &Buffer::from_vec(vec![0; 48]),
                &full_roi(4, 4),
                &full_roi(4, 4),
                PixelFormat::Rgb888,
                PixelFormat::Yuv420SemiPlanar,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Adapter(_)));
    }

    #[test]
    fn test_rejects_mismatched_input_length() {
        let err = scaler()
            .apply(
                &Buffer::from_vec(vec![0; 23]),
                &full_roi(4, 4),
                &full_roi(4, 4),
                PixelFormat::Yuv420SemiPlanar,
                PixelFormat::Yuv420SemiPlanar,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_exhausted_pool_fails_allocation() {
        let scaler = NearestScaler::new(Arc::new(MemoryPool::new(4)));
        let err = scaler
            .apply(
                &Buffer::from_vec(vec![0; 24]),
                &full_roi(4, 4),
                &full_roi(4, 4),
                PixelFormat::Yuv420SemiPlanar,
                PixelFormat::Yuv420SemiPlanar,
            )
            .unwrap_err();
        assert!(matches!(err, Error::AllocationFailed { .. }));
    }

    #[test]
    fn test_camera_to_network_geometry() {
        // A 1024x684 camera frame cropped full-frame and scaled to the
        // 224x224 network input.
        let source = full_roi(1024, 684);
        let dest = full_roi(224, 224);

        assert_eq!(source.buffer_len(PixelFormat::Yuv420SemiPlanar), 1_050_624);
        assert_eq!(dest.buffer_len(PixelFormat::Yuv420SemiPlanar), 75_264);

        let frame = Buffer::from_vec(vec![128; 1_050_624]);
        let out = scaler()
            .apply(
                &frame,
                &source,
                &dest,
                PixelFormat::Yuv420SemiPlanar,
                PixelFormat::Yuv420SemiPlanar,
            )
            .unwrap();
        assert_eq!(out.len(), 75_264);
        assert!(out.as_slice().iter().all(|&b| b == 128));
    }
}
