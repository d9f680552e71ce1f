// src/overlay.rs

use crate::types::{Detection, Frame};

/// Renders detections onto a frame's pixels.
pub trait Annotator: Send + Sync {
    fn annotate(&self, frame: &mut Frame, detections: &[Detection]) -> Result<(), String>;
}

// Class colors, BGR
const PALETTE: [[u8; 3]; 8] = [
    [0, 165, 255],  // Orange
    [0, 255, 0],    // Green
    [255, 128, 0],  // Blue
    [0, 0, 255],    // Red
    [255, 0, 255],  // Magenta
    [255, 255, 0],  // Cyan
    [0, 255, 255],  // Yellow
    [180, 105, 255], // Pink
];

pub fn class_color(class_id: usize) -> [u8; 3] {
    PALETTE[class_id % PALETTE.len()]
}

/// `"player 0.87"`
pub fn detection_label(detection: &Detection) -> String {
    format!("{} {:.2}", detection.class_name, detection.confidence)
}

/// Text color that stays readable on the given background.
pub fn label_text_color(background: [u8; 3]) -> [u8; 3] {
    let [b, g, r] = background;
    let luma = 0.114 * b as f32 + 0.587 * g as f32 + 0.299 * r as f32;
    if luma > 140.0 {
        [0, 0, 0]
    } else {
        [255, 255, 255]
    }
}

#[cfg(feature = "opencv")]
pub use cv::BoxOverlay;

#[cfg(feature = "opencv")]
mod cv {
    use super::{class_color, detection_label, label_text_color, Annotator};
    use crate::types::{Detection, Frame};
    use opencv::{
        core::{self, Mat},
        imgproc,
        prelude::*,
    };

    const BOX_THICKNESS: i32 = 2;
    const FONT_SCALE: f64 = 0.5;
    const FONT_THICKNESS: i32 = 1;

    fn scalar([b, g, r]: [u8; 3]) -> core::Scalar {
        core::Scalar::new(b as f64, g as f64, r as f64, 0.0)
    }

    /// Draws a box and a filled label tab for every detection.
    #[derive(Debug, Default, Clone)]
    pub struct BoxOverlay;

    impl BoxOverlay {
        pub fn new() -> Self {
            Self
        }

        fn draw(&self, frame: &mut Frame, detections: &[Detection]) -> opencv::Result<()> {
            let mut output = {
                let mat = Mat::from_slice(&frame.data)?;
                let mat = mat.reshape(3, frame.height as i32)?;
                mat.try_clone()?
            };

            for det in detections {
                let color = class_color(det.class_id);
                let x1 = det.bbox.x1.round() as i32;
                let y1 = det.bbox.y1.round() as i32;
                let w = det.bbox.width().round().max(1.0) as i32;
                let h = det.bbox.height().round().max(1.0) as i32;

                imgproc::rectangle(
                    &mut output,
                    core::Rect::new(x1, y1, w, h),
                    scalar(color),
                    BOX_THICKNESS,
                    imgproc::LINE_AA,
                    0,
                )?;

                // Label tab sits above the box, or inside it at the top edge
                let label = detection_label(det);
                let mut baseline = 0;
                let text_size = imgproc::get_text_size(
                    &label,
                    imgproc::FONT_HERSHEY_SIMPLEX,
                    FONT_SCALE,
                    FONT_THICKNESS,
                    &mut baseline,
                )?;
                let tab_h = text_size.height + baseline + 4;
                let tab_y = if y1 - tab_h >= 0 { y1 - tab_h } else { y1 };

                imgproc::rectangle(
                    &mut output,
                    core::Rect::new(x1, tab_y, text_size.width + 4, tab_h),
                    scalar(color),
                    -1,
                    imgproc::LINE_8,
                    0,
                )?;

                imgproc::put_text(
                    &mut output,
                    &label,
                    core::Point::new(x1 + 2, tab_y + text_size.height + 2),
                    imgproc::FONT_HERSHEY_SIMPLEX,
                    FONT_SCALE,
                    scalar(label_text_color(color)),
                    FONT_THICKNESS,
                    imgproc::LINE_AA,
                    false,
                )?;
            }

            frame.data.copy_from_slice(output.data_bytes()?);
            Ok(())
        }
    }

    impl Annotator for BoxOverlay {
        fn annotate(&self, frame: &mut Frame, detections: &[Detection]) -> Result<(), String> {
            self.draw(frame, detections).map_err(|e| e.to_string())
        }
    }
}
