// src/player_detection.rs

use crate::error::DetectorError;
use crate::preprocessing::Letterbox;
use crate::types::{BoundingBox, Detection, DetectionSettings, Frame};
use tracing::debug;

/// A pretrained object detector run on single frames.
///
/// Implementations may keep per-session state (e.g. an ONNX session),
/// hence `&mut self`.
pub trait Detector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        settings: &DetectionSettings,
    ) -> Result<Vec<Detection>, DetectorError>;
}

pub fn class_name(class_names: &[String], class_id: usize) -> String {
    class_names
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("class {}", class_id))
}

/// Decode a YOLOv8 / YOLO11 detection head.
///
/// Output layout is `[1, 4 + num_classes, num_anchors]`, channel-major:
/// `cx, cy, w, h` in canvas pixels followed by one score per class.
pub fn decode_predictions(
    output: &[f32],
    dims: &[i64],
    letterbox: &Letterbox,
    settings: &DetectionSettings,
    class_names: &[String],
    frame_size: (usize, usize),
) -> Result<Vec<Detection>, DetectorError> {
    let (channels, anchors) = match dims {
        [1, c, a] if *c > 4 && *a > 0 => (*c as usize, *a as usize),
        _ => {
            return Err(DetectorError::UnexpectedOutput(format!(
                "expected [1, 4 + classes, anchors], got {:?}",
                dims
            )))
        }
    };

    if output.len() != channels * anchors {
        return Err(DetectorError::UnexpectedOutput(format!(
            "tensor has {} values, shape {:?} needs {}",
            output.len(),
            dims,
            channels * anchors
        )));
    }

    let num_classes = channels - 4;
    let (frame_w, frame_h) = (frame_size.0 as f32, frame_size.1 as f32);
    let mut candidates = Vec::new();

    for i in 0..anchors {
        // Find best class
        let mut max_conf = 0.0f32;
        let mut best_class = 0;

        for c in 0..num_classes {
            let conf = output[anchors * (4 + c) + i];
            if conf > max_conf {
                max_conf = conf;
                best_class = c;
            }
        }

        if max_conf < settings.confidence_threshold {
            continue;
        }

        let canvas_box = BoundingBox::from_center(
            output[i],
            output[anchors + i],
            output[anchors * 2 + i],
            output[anchors * 3 + i],
        );
        let bbox = letterbox.to_source(&canvas_box).clamp(frame_w, frame_h);

        if bbox.area() <= 0.0 {
            continue;
        }

        candidates.push(Detection {
            bbox,
            confidence: max_conf,
            class_id: best_class,
            class_name: class_name(class_names, best_class),
        });
    }

    let mut detections = nms(candidates, settings.nms_iou_threshold);
    detections.truncate(settings.max_detections);

    debug!("Decoded {} detections from {} anchors", detections.len(), anchors);
    Ok(detections)
}

/// Class-aware non-maximum suppression. Output is sorted by confidence.
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());

    for det in detections {
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == det.class_id && k.bbox.iou(&det.bbox) >= iou_threshold);
        if !suppressed {
            keep.push(det);
        }
    }

    keep
}

// ============================================================================
// ONNX RUNTIME DETECTOR
// ============================================================================

#[cfg(feature = "onnx")]
pub use onnx::YoloDetector;

#[cfg(feature = "onnx")]
mod onnx {
    use super::{decode_predictions, Detector};
    use crate::error::DetectorError;
    use crate::inference::InferenceEngine;
    use crate::preprocessing::letterbox;
    use crate::types::{Config, Detection, DetectionSettings, Frame};
    use tracing::{debug, info};

    /// Player / ball detector backed by an exported YOLO model.
    ///
    /// Built once at startup and shared by every processing run.
    pub struct YoloDetector {
        engine: InferenceEngine,
        class_names: Vec<String>,
    }

    impl YoloDetector {
        pub fn new(config: &Config) -> Result<Self, DetectorError> {
            info!("Loading YOLO model: {}", config.model.path);
            let engine = InferenceEngine::new(config)?;

            info!(
                "✓ YOLO detector initialized ({} classes: {})",
                config.model.class_names.len(),
                config.model.class_names.join(", ")
            );
            Ok(Self {
                engine,
                class_names: config.model.class_names.clone(),
            })
        }
    }

    impl Detector for YoloDetector {
        fn detect(
            &mut self,
            frame: &Frame,
            settings: &DetectionSettings,
        ) -> Result<Vec<Detection>, DetectorError> {
            // 1. Preprocess (letterbox + normalize)
            let (input, lb) = letterbox(frame, settings.input_size)?;

            // 2. Run inference
            let (dims, output) = self.engine.infer(input, settings.input_size)?;

            // 3. Postprocess (decode + NMS)
            let detections = decode_predictions(
                &output,
                &dims,
                &lb,
                settings,
                &self.class_names,
                (frame.width, frame.height),
            )?;

            debug!("Frame {}: {} detections", frame.index, detections.len());
            Ok(detections)
        }
    }
}
