use std::error::Error;
use ndarray::ArrayView4;

use crate::capture::Frame;
use crate::model::TensorLayout;

/// Turns RGBA frames into model input tensors.
///
/// All buffers — the square RGBA resize target, the normalized
/// channel-last floats and the channel-first rearrangement — are
/// allocated once and reused across frames, so steady-state preprocessing
/// performs no allocation at all.
pub struct Preprocessor {
    size: usize,
    /// RGBA resize target, size*size*4
    resized: Vec<u8>,
    /// Normalized channel-last floats, size*size*3
    pixels: Vec<f32>,
    /// Channel-first rearrangement, size*size*3
    planes: Vec<f32>,
}

impl Preprocessor {
    /// Creates a preprocessor for a fixed square input size.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            resized: vec![0; size * size * 4],
            pixels: vec![0.0; size * size * 3],
            planes: vec![0.0; size * size * 3],
        }
    }

    /// The square side length in pixels.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Produces a `[1,3,S,S]` or `[1,S,S,3]` tensor view for the frame.
    ///
    /// The view borrows the internal buffers; run inference on it before
    /// the next frame overwrites them.
    pub fn tensor(
        &mut self,
        frame: &Frame,
        layout: TensorLayout,
    ) -> Result<ArrayView4<'_, f32>, Box<dyn Error + Send + Sync>> {
        if frame.width == 0 || frame.height == 0 {
            return Err("frame has no pixels".into());
        }
        let expected = frame.width as usize * frame.height as usize * 4;
        if frame.pixels.len() < expected {
            return Err(format!(
                "frame buffer holds {} bytes, expected {}",
                frame.pixels.len(),
                expected
            )
            .into());
        }

        self.resize_into(frame);
        self.normalize();

        let s = self.size;
        match layout {
            TensorLayout::ChannelFirst => {
                self.rearrange_planes();
                ArrayView4::from_shape((1, 3, s, s), &self.planes)
                    .map_err(|e| e.to_string().into())
            }
            TensorLayout::ChannelLast => {
                ArrayView4::from_shape((1, s, s, 3), &self.pixels)
                    .map_err(|e| e.to_string().into())
            }
        }
    }

    /// Bilinear scale of the source frame into the fixed square target.
    fn resize_into(&mut self, frame: &Frame) {
        let src_w = frame.width as usize;
        let src_h = frame.height as usize;
        let s = self.size;

        for y in 0..s {
            let sy = ((y as f32 + 0.5) * src_h as f32 / s as f32 - 0.5).max(0.0);
            let y0 = (sy as usize).min(src_h - 1);
            let y1 = (y0 + 1).min(src_h - 1);
            let fy = sy - y0 as f32;

            for x in 0..s {
                let sx = ((x as f32 + 0.5) * src_w as f32 / s as f32 - 0.5).max(0.0);
                let x0 = (sx as usize).min(src_w - 1);
                let x1 = (x0 + 1).min(src_w - 1);
                let fx = sx - x0 as f32;

                for c in 0..4 {
                    let p00 = frame.pixels[(y0 * src_w + x0) * 4 + c] as f32;
                    let p01 = frame.pixels[(y0 * src_w + x1) * 4 + c] as f32;
                    let p10 = frame.pixels[(y1 * src_w + x0) * 4 + c] as f32;
                    let p11 = frame.pixels[(y1 * src_w + x1) * 4 + c] as f32;
                    let top = p00 + (p01 - p00) * fx;
                    let bottom = p10 + (p11 - p10) * fx;
                    let value = top + (bottom - top) * fy;
                    self.resized[(y * s + x) * 4 + c] = value.round() as u8;
                }
            }
        }
    }

    /// Scales RGB channels to [0,1]; alpha is dropped.
    fn normalize(&mut self) {
        for i in 0..self.size * self.size {
            self.pixels[i * 3] = self.resized[i * 4] as f32 / 255.0;
            self.pixels[i * 3 + 1] = self.resized[i * 4 + 1] as f32 / 255.0;
            self.pixels[i * 3 + 2] = self.resized[i * 4 + 2] as f32 / 255.0;
        }
    }

    /// HWC → CHW without reallocating.
    fn rearrange_planes(&mut self) {
        let n = self.size * self.size;
        for c in 0..3 {
            for i in 0..n {
                self.planes[c * n + i] = self.pixels[i * 3 + c];
            }
        }
    }
}
