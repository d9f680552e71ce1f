// src/error.rs
//
// Every failure is terminal for the run it happens in. Messages are shown
// to the user verbatim, so keep them readable.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No video file was provided")]
    MissingFile,

    #[error("File '{filename}' has no extension (expected mp4, avi or mov)")]
    MissingExtension { filename: String },

    #[error("Unsupported video format '.{extension}' (expected mp4, avi or mov)")]
    UnsupportedFormat { extension: String },

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to open video {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Failed to read frame {frame_index}: {reason}")]
    Read { frame_index: u64, reason: String },
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Failed to load detection model: {0}")]
    ModelLoad(String),

    #[error("Invalid frame for detection: {0}")]
    Preprocess(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Failed to open output video {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Failed to write frame {frame_index}: {reason}")]
    Write { frame_index: u64, reason: String },

    #[error("Failed to finalize output video: {0}")]
    Finalize(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Detection failed on frame {frame_index}: {source}")]
    Detection {
        frame_index: u64,
        #[source]
        source: DetectorError,
    },

    #[error("Failed to draw detections on frame {frame_index}: {reason}")]
    Annotate { frame_index: u64, reason: String },

    #[error(transparent)]
    Encode(#[from] EncodeError),
}
