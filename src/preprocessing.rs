// src/preprocessing.rs

use crate::error::DetectorError;
use crate::types::{BoundingBox, Frame};

const PAD_VALUE: u8 = 114;

/// Mapping between source-frame pixels and the square detector canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Maps a box from detector coordinates back to source-frame pixels.
    pub fn to_source(&self, bbox: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x1: (bbox.x1 - self.pad_x) / self.scale,
            y1: (bbox.y1 - self.pad_y) / self.scale,
            x2: (bbox.x2 - self.pad_x) / self.scale,
            y2: (bbox.y2 - self.pad_y) / self.scale,
        }
    }
}

/// Letterbox a BGR frame into a `size x size` RGB canvas, normalized to
/// [0, 1] in CHW order.
pub fn letterbox(frame: &Frame, size: usize) -> Result<(Vec<f32>, Letterbox), DetectorError> {
    let (src_w, src_h) = (frame.width, frame.height);

    if src_w == 0 || src_h == 0 || size == 0 {
        return Err(DetectorError::Preprocess(format!(
            "empty frame {}x{} (target {})",
            src_w, src_h, size
        )));
    }
    if frame.data.len() != src_w * src_h * 3 {
        return Err(DetectorError::Preprocess(format!(
            "frame buffer is {} bytes, expected {} for {}x{} BGR",
            frame.data.len(),
            src_w * src_h * 3,
            src_w,
            src_h
        )));
    }

    // Fit inside the canvas, keep aspect ratio
    let scale = (size as f32 / src_w as f32).min(size as f32 / src_h as f32);
    let scaled_w = ((src_w as f32 * scale).round() as usize).clamp(1, size);
    let scaled_h = ((src_h as f32 * scale).round() as usize).clamp(1, size);

    // Center the image, any odd pixel goes to the bottom/right
    let pad_x = (size - scaled_w) / 2;
    let pad_y = (size - scaled_h) / 2;

    let resized = resize_bilinear(&frame.data, src_w, src_h, scaled_w, scaled_h);

    let mut canvas = vec![PAD_VALUE; size * size * 3];
    for y in 0..scaled_h {
        let src_row = y * scaled_w * 3;
        let dst_row = ((y + pad_y) * size + pad_x) * 3;
        canvas[dst_row..dst_row + scaled_w * 3]
            .copy_from_slice(&resized[src_row..src_row + scaled_w * 3]);
    }

    // BGR -> RGB, [0, 255] -> [0, 1], HWC -> CHW
    let plane = size * size;
    let mut input = vec![0.0f32; 3 * plane];
    for i in 0..plane {
        let px = &canvas[i * 3..i * 3 + 3];
        input[i] = px[2] as f32 / 255.0;
        input[plane + i] = px[1] as f32 / 255.0;
        input[2 * plane + i] = px[0] as f32 / 255.0;
    }

    Ok((
        input,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    ))
}

/// Bilinear image resize
fn resize_bilinear(src: &[u8], src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * 3];

    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            // Sample at pixel centers
            let sx = ((dx as f32 + 0.5) * x_ratio - 0.5).max(0.0);
            let sy = ((dy as f32 + 0.5) * y_ratio - 0.5).max(0.0);

            let sx0 = (sx.floor() as usize).min(src_w - 1);
            let sy0 = (sy.floor() as usize).min(src_h - 1);
            let sx1 = (sx0 + 1).min(src_w - 1);
            let sy1 = (sy0 + 1).min(src_h - 1);

            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..3 {
                let p00 = src[(sy0 * src_w + sx0) * 3 + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * 3 + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * 3 + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * 3 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * 3 + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: usize, height: usize, bgr: [u8; 3]) -> Frame {
        Frame {
            data: bgr.iter().copied().cycle().take(width * height * 3).collect(),
            width,
            height,
            index: 0,
            timestamp_ms: 0.0,
        }
    }

    #[test]
    fn test_letterbox_landscape() {
        let frame = solid_frame(640, 480, [10, 20, 30]);
        let (input, lb) = letterbox(&frame, 320).unwrap();

        assert_eq!(input.len(), 3 * 320 * 320);
        assert!((lb.scale - 0.5).abs() < 1e-6);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 40.0);

        // Top padding row is gray
        assert!((input[0] - 114.0 / 255.0).abs() < 1e-6);

        // Image area is RGB ordered
        let plane = 320 * 320;
        let center = 160 * 320 + 160;
        assert!((input[center] - 30.0 / 255.0).abs() < 1e-6);
        assert!((input[plane + center] - 20.0 / 255.0).abs() < 1e-6);
        assert!((input[2 * plane + center] - 10.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_letterbox_roundtrip_box() {
        let frame = solid_frame(1280, 720, [0, 0, 0]);
        let (_, lb) = letterbox(&frame, 320).unwrap();

        // scale 0.25, content height 180 -> pad_y 70
        assert_eq!(lb.pad_y, 70.0);
        let mapped = lb.to_source(&BoundingBox::new(10.0, 80.0, 20.0, 100.0));
        assert!((mapped.x1 - 40.0).abs() < 1e-4);
        assert!((mapped.y1 - 40.0).abs() < 1e-4);
        assert!((mapped.x2 - 80.0).abs() < 1e-4);
        assert!((mapped.y2 - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_letterbox_rejects_bad_buffer() {
        let mut frame = solid_frame(4, 4, [1, 2, 3]);
        frame.data.truncate(10);
        assert!(letterbox(&frame, 320).is_err());

        let empty = solid_frame(0, 0, [0, 0, 0]);
        assert!(letterbox(&empty, 320).is_err());
    }

    #[test]
    fn test_resize() {
        let src = vec![255u8; 100 * 100 * 3];
        let dst = resize_bilinear(&src, 100, 100, 50, 50);
        assert_eq!(dst.len(), 50 * 50 * 3);
        assert!(dst.iter().all(|&v| v == 255));
    }
}
