// src/main.rs

use anyhow::Result;
use player_detection::player_detection::YoloDetector;
use player_detection::server::{self, AppState};
use player_detection::service::OpencvYoloService;
use player_detection::types::{Config, DetectionSettings};
use player_detection::video_processor::VideoProcessor;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_or_default()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "player_detection={},tower_http=info,ort=warn",
            config.logging.level
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("⚽ Player & Ball Detection Starting");
    info!("✓ Configuration loaded");

    let settings = DetectionSettings::FIXED;
    info!(
        "Detection: conf={:.2}, imgsz={}, every {} frames",
        settings.confidence_threshold, settings.input_size, settings.frame_skip
    );

    let detector = YoloDetector::new(&config)?;
    info!("✓ Detector ready ({})", config.model.path);

    let video_processor = VideoProcessor::new(config.video.clone());
    let service = OpencvYoloService::new(detector, video_processor);

    let temp_dir = config.temp_dir();
    std::fs::create_dir_all(&temp_dir)?;
    info!("📁 Temporary files in {}", temp_dir.display());

    let state = AppState::new(Arc::new(service), temp_dir);
    server::serve(&config.bind_address(), state).await
}
