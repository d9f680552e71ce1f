// src/lib.rs

pub mod config;
pub mod error;
#[cfg(feature = "onnx")]
pub mod inference;
pub mod overlay;
pub mod pipeline;
pub mod player_detection;
pub mod preprocessing;
pub mod server;
pub mod service;
pub mod types;
pub mod upload;
pub mod video_processor;
