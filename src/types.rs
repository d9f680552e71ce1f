// src/types.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: String,
    #[serde(default = "default_class_names")]
    pub class_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default)]
    pub use_cuda: bool,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Directory for the uploaded input and the rendered output.
    /// `None` means the system temp dir.
    #[serde(default)]
    pub temp_dir: Option<String>,
    #[serde(default = "default_fourcc")]
    pub fourcc: String,
    #[serde(default = "default_fallback_fps")]
    pub fallback_fps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_model_path() -> String {
    "models/best.onnx".to_string()
}

fn default_class_names() -> Vec<String> {
    ["ball", "goalkeeper", "player", "referee"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_num_threads() -> usize {
    4
}

fn default_fourcc() -> String {
    "mp4v".to_string()
}

fn default_fallback_fps() -> f64 {
    30.0
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8501
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            class_names: default_class_names(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            use_cuda: false,
            num_threads: default_num_threads(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            fourcc: default_fourcc(),
            fallback_fps: default_fallback_fps(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

// ============================================================================
// FIXED DETECTION CONSTANTS
// ============================================================================

/// Detection parameters. These are product constants, not configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionSettings {
    pub confidence_threshold: f32,
    pub input_size: usize,
    /// A fresh detection runs on every frame whose index is a multiple of this.
    pub frame_skip: u64,
    pub nms_iou_threshold: f32,
    pub max_detections: usize,
}

impl DetectionSettings {
    pub const FIXED: DetectionSettings = DetectionSettings {
        confidence_threshold: 0.3,
        input_size: 320,
        frame_skip: 10,
        nms_iou_threshold: 0.7,
        max_detections: 300,
    };

    pub fn is_detection_frame(&self, frame_index: u64) -> bool {
        frame_index % self.frame_skip.max(1) == 0
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self::FIXED
    }
}

// ============================================================================
// FRAMES
// ============================================================================

/// One decoded frame, packed BGR24.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub index: u64,
    pub timestamp_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub fps: f64,
    pub width: usize,
    pub height: usize,
    /// `None` when the container reports no usable frame count.
    pub total_frames: Option<u64>,
}

impl VideoMetadata {
    /// Normalizes the raw container frame count: zero or negative means unknown.
    pub fn frame_count_from_container(raw: f64) -> Option<u64> {
        if raw.is_finite() && raw >= 1.0 {
            Some(raw as u64)
        } else {
            None
        }
    }
}

// ============================================================================
// DETECTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    pub fn clamp(&self, width: f32, height: f32) -> Self {
        Self {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: usize,
    pub class_name: String,
}

/// Detector output for a single frame. Dropped once rendered.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub frame_index: u64,
    pub detections: Vec<Detection>,
}

// ============================================================================
// UPLOAD FORMATS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    Mp4,
    Avi,
    Mov,
}

impl VideoFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" => Some(VideoFormat::Mp4),
            "avi" => Some(VideoFormat::Avi),
            "mov" => Some(VideoFormat::Mov),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Avi => "avi",
            VideoFormat::Mov => "mov",
        }
    }
}
