// src/service.rs

use crate::error::PipelineError;
use crate::pipeline::{MetricsSummary, ProgressSink};
use std::path::Path;

/// One complete processing run: read `input`, write the annotated video to
/// `output`. Blocking.
pub trait AnnotationService: Send + Sync + 'static {
    fn annotate_video(
        &self,
        input: &Path,
        output: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<MetricsSummary, PipelineError>;
}

#[cfg(all(feature = "opencv", feature = "onnx"))]
pub use backend::OpencvYoloService;

#[cfg(all(feature = "opencv", feature = "onnx"))]
mod backend {
    use super::AnnotationService;
    use crate::error::PipelineError;
    use crate::overlay::BoxOverlay;
    use crate::pipeline::{MetricsSummary, ProgressSink, VideoAnnotationPipeline};
    use crate::player_detection::YoloDetector;
    use crate::video_processor::{FrameSource, VideoProcessor};
    use std::path::Path;
    use std::sync::{Mutex, PoisonError};
    use tracing::info;

    /// OpenCV decode/encode around a shared YOLO detector.
    pub struct OpencvYoloService {
        detector: Mutex<YoloDetector>,
        overlay: BoxOverlay,
        video_processor: VideoProcessor,
    }

    impl OpencvYoloService {
        pub fn new(detector: YoloDetector, video_processor: VideoProcessor) -> Self {
            Self {
                detector: Mutex::new(detector),
                overlay: BoxOverlay::new(),
                video_processor,
            }
        }
    }

    impl AnnotationService for OpencvYoloService {
        fn annotate_video(
            &self,
            input: &Path,
            output: &Path,
            progress: &dyn ProgressSink,
        ) -> Result<MetricsSummary, PipelineError> {
            let mut reader = self.video_processor.open_video(input)?;
            let mut writer = self
                .video_processor
                .create_writer(output, &reader.metadata())?;

            // detect() keeps no state between calls, a poisoned lock is still usable
            let mut detector = self.detector.lock().unwrap_or_else(PoisonError::into_inner);

            info!("🎯 Running detection on {}", input.display());
            VideoAnnotationPipeline::new().run(
                &mut reader,
                &mut *detector,
                &self.overlay,
                &mut writer,
                progress,
            )
        }
    }
}
