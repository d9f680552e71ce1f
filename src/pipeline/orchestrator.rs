// src/pipeline/orchestrator.rs
//
// Upload -> decode -> (every Nth frame) detect + draw -> encode.
// Single-threaded: each frame is fully written before the next is read.

use super::metrics::{MetricsSummary, PipelineMetrics};
use super::progress::{ProgressSink, ProgressUpdate};
use crate::error::PipelineError;
use crate::overlay::Annotator;
use crate::player_detection::Detector;
use crate::types::{DetectionResult, DetectionSettings, Frame};
use crate::video_processor::{FrameSink, FrameSource};
use std::time::Instant;
use tracing::{debug, info};

const PROGRESS_LOG_INTERVAL: u64 = 50;

pub struct VideoAnnotationPipeline {
    settings: DetectionSettings,
    metrics: PipelineMetrics,
}

impl VideoAnnotationPipeline {
    pub fn new() -> Self {
        Self::with_settings(DetectionSettings::FIXED)
    }

    pub fn with_settings(settings: DetectionSettings) -> Self {
        Self {
            settings,
            metrics: PipelineMetrics::new(),
        }
    }

    /// Annotate every frame of `source` into `sink`.
    ///
    /// Frames whose index is a multiple of the skip interval get a fresh
    /// detection. Every other frame re-emits the last annotated frame as-is,
    /// so the output holds the same picture for the whole interval. Output
    /// frame count always equals input frame count.
    ///
    /// Any error aborts the run; `sink` is not finalized in that case.
    pub fn run<S, D, A, K>(
        &self,
        source: &mut S,
        detector: &mut D,
        annotator: &A,
        sink: &mut K,
        progress: &dyn ProgressSink,
    ) -> Result<MetricsSummary, PipelineError>
    where
        S: FrameSource + ?Sized,
        D: Detector + ?Sized,
        A: Annotator + ?Sized,
        K: FrameSink + ?Sized,
    {
        let total_frames = source.metadata().total_frames;
        let mut frame_index: u64 = 0;
        let mut last_annotated: Option<Frame> = None;

        while let Some(frame) = source.read_frame()? {
            self.metrics.inc(&self.metrics.frames_decoded);

            if self.settings.is_detection_frame(frame_index) {
                let mut frame = frame;
                let result = self.detect(detector, &frame, frame_index)?;
                debug!(
                    "Frame {} @ {:.0} ms: {} detections",
                    result.frame_index,
                    frame.timestamp_ms,
                    result.detections.len()
                );

                annotator
                    .annotate(&mut frame, &result.detections)
                    .map_err(|reason| PipelineError::Annotate {
                        frame_index: result.frame_index,
                        reason,
                    })?;

                sink.write_frame(&frame)?;
                last_annotated = Some(frame);
            } else if let Some(held) = last_annotated.as_ref() {
                sink.write_frame(held)?;
            } else {
                // Unreachable while frame 0 is always a detection frame
                sink.write_frame(&frame)?;
            }
            self.metrics.inc(&self.metrics.frames_written);

            frame_index += 1;
            let update = ProgressUpdate::new(frame_index, total_frames);
            progress.report(update);

            if frame_index % PROGRESS_LOG_INTERVAL == 0 {
                info!(
                    "Progress: {} | detector runs: {} | {:.1} FPS",
                    update
                        .percent
                        .map(|p| format!("{}% ({})", p, update.status_text()))
                        .unwrap_or_else(|| update.status_text()),
                    self.metrics.summary().detector_runs,
                    self.metrics.fps()
                );
            }
        }

        sink.finish()?;

        let summary = self.metrics.summary();
        info!("📊 Final Report:");
        info!("  Frames: {} in / {} out", summary.frames_decoded, summary.frames_written);
        info!("  Detector runs: {}", summary.detector_runs);
        info!("  Detections drawn: {}", summary.detections);
        info!("  Avg detection: {} µs", summary.avg_detect_us);
        info!("  Processing Speed: {:.1} FPS", summary.fps);

        Ok(summary)
    }

    fn detect<D: Detector + ?Sized>(
        &self,
        detector: &mut D,
        frame: &Frame,
        frame_index: u64,
    ) -> Result<DetectionResult, PipelineError> {
        let started = Instant::now();
        let detections = detector
            .detect(frame, &self.settings)
            .map_err(|source| PipelineError::Detection {
                frame_index,
                source,
            })?;

        self.metrics.inc(&self.metrics.detector_runs);
        self.metrics
            .add(&self.metrics.detect_time_us, started.elapsed().as_micros() as u64);
        self.metrics
            .add(&self.metrics.detections, detections.len() as u64);

        Ok(DetectionResult {
            frame_index,
            detections,
        })
    }
}

impl Default for VideoAnnotationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, DetectorError, EncodeError};
    use crate::pipeline::progress::NoProgress;
    use crate::types::{BoundingBox, Detection, VideoMetadata};
    use std::sync::Mutex;

    const W: usize = 4;
    const H: usize = 2;

    struct FakeSource {
        remaining: std::ops::Range<u64>,
        total_frames: Option<u64>,
        fail_at: Option<u64>,
    }

    impl FakeSource {
        fn new(frames: u64) -> Self {
            Self {
                remaining: 0..frames,
                total_frames: Some(frames),
                fail_at: None,
            }
        }
    }

    impl FrameSource for FakeSource {
        fn metadata(&self) -> VideoMetadata {
            VideoMetadata {
                fps: 30.0,
                width: W,
                height: H,
                total_frames: self.total_frames,
            }
        }

        fn read_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
            let Some(index) = self.remaining.next() else {
                return Ok(None);
            };
            if self.fail_at == Some(index) {
                return Err(DecodeError::Read {
                    frame_index: index,
                    reason: "corrupt packet".to_string(),
                });
            }
            Ok(Some(Frame {
                data: vec![index as u8; W * H * 3],
                width: W,
                height: H,
                index,
                timestamp_ms: index as f64 * 1000.0 / 30.0,
            }))
        }
    }

    /// One object per frame; optionally fails from a given frame on.
    #[derive(Default)]
    struct FakeDetector {
        calls: Vec<u64>,
        fail_from: Option<u64>,
    }

    impl Detector for FakeDetector {
        fn detect(
            &mut self,
            frame: &Frame,
            settings: &DetectionSettings,
        ) -> Result<Vec<Detection>, DetectorError> {
            assert_eq!(settings.confidence_threshold, 0.3);
            assert_eq!(settings.input_size, 320);
            if self.fail_from.is_some_and(|from| frame.index >= from) {
                return Err(DetectorError::Inference("model crashed".to_string()));
            }
            self.calls.push(frame.index);
            Ok(vec![Detection {
                bbox: BoundingBox::new(0.0, 0.0, 2.0, 1.0),
                confidence: 0.9,
                class_id: 2,
                class_name: "player".to_string(),
            }])
        }
    }

    /// Marks the first pixel with the detection count and the frame index.
    struct StampAnnotator;

    impl Annotator for StampAnnotator {
        fn annotate(&self, frame: &mut Frame, detections: &[Detection]) -> Result<(), String> {
            frame.data[0] = 255;
            frame.data[1] = detections.len() as u8;
            frame.data[2] = frame.index as u8;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<Frame>,
        finished: bool,
    }

    impl FrameSink for RecordingSink {
        fn write_frame(&mut self, frame: &Frame) -> Result<(), EncodeError> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<(), EncodeError> {
            self.finished = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        updates: Mutex<Vec<ProgressUpdate>>,
    }

    impl ProgressSink for RecordingProgress {
        fn report(&self, update: ProgressUpdate) {
            self.updates.lock().unwrap().push(update);
        }
    }

    #[test]
    fn test_thirty_frame_video() {
        let pipeline = VideoAnnotationPipeline::new();
        let mut source = FakeSource::new(30);
        let mut detector = FakeDetector::default();
        let mut sink = RecordingSink::default();
        let progress = RecordingProgress::default();

        let summary = pipeline
            .run(&mut source, &mut detector, &StampAnnotator, &mut sink, &progress)
            .unwrap();

        assert_eq!(sink.frames.len(), 30);
        assert!(sink.finished);
        assert_eq!(detector.calls, vec![0, 10, 20]);
        assert_eq!(summary.frames_decoded, 30);
        assert_eq!(summary.frames_written, 30);
        assert_eq!(summary.detector_runs, 3);
        assert_eq!(summary.detections, 3);

        for (i, frame) in sink.frames.iter().enumerate() {
            let fresh = i - i % 10;
            // Fresh detection frames carry their own stamp
            assert_eq!(frame.data[..3], [255, 1, fresh as u8]);
            // Skipped frames are byte-identical to the last fresh one
            assert_eq!(frame, &sink.frames[fresh]);
        }
    }

    #[test]
    fn test_output_count_matches_input() {
        for frames in [1u64, 9, 10, 11, 57] {
            let mut sink = RecordingSink::default();
            VideoAnnotationPipeline::new()
                .run(
                    &mut FakeSource::new(frames),
                    &mut FakeDetector::default(),
                    &StampAnnotator,
                    &mut sink,
                    &NoProgress,
                )
                .unwrap();
            assert_eq!(sink.frames.len() as u64, frames);
        }
    }

    #[test]
    fn test_empty_video() {
        let mut sink = RecordingSink::default();
        let mut detector = FakeDetector::default();
        let summary = VideoAnnotationPipeline::new()
            .run(
                &mut FakeSource::new(0),
                &mut detector,
                &StampAnnotator,
                &mut sink,
                &NoProgress,
            )
            .unwrap();
        assert!(sink.frames.is_empty());
        assert!(sink.finished);
        assert!(detector.calls.is_empty());
        assert_eq!(summary.frames_written, 0);
    }

    #[test]
    fn test_progress_monotonic_and_reaches_100() {
        let progress = RecordingProgress::default();
        VideoAnnotationPipeline::new()
            .run(
                &mut FakeSource::new(30),
                &mut FakeDetector::default(),
                &StampAnnotator,
                &mut RecordingSink::default(),
                &progress,
            )
            .unwrap();

        let updates = progress.updates.lock().unwrap();
        assert_eq!(updates.len(), 30);
        let percents: Vec<u8> = updates.iter().map(|u| u.percent.unwrap()).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(percents[0], 3);
        assert_eq!(*percents.last().unwrap(), 100);
        assert_eq!(updates[9].frames_done, 10);
    }

    #[test]
    fn test_unknown_frame_count_is_indeterminate() {
        let mut source = FakeSource::new(12);
        source.total_frames = None;
        let progress = RecordingProgress::default();
        let mut sink = RecordingSink::default();

        VideoAnnotationPipeline::new()
            .run(
                &mut source,
                &mut FakeDetector::default(),
                &StampAnnotator,
                &mut sink,
                &progress,
            )
            .unwrap();

        let updates = progress.updates.lock().unwrap();
        assert!(updates.iter().all(|u| u.percent.is_none()));
        assert_eq!(updates.last().unwrap().frames_done, 12);
        assert_eq!(sink.frames.len(), 12);
    }

    #[test]
    fn test_detector_failure_aborts_run() {
        // Every frame is a detection frame, detector dies on frame 15 of 30
        let pipeline = VideoAnnotationPipeline::with_settings(DetectionSettings {
            frame_skip: 1,
            ..DetectionSettings::FIXED
        });
        let mut detector = FakeDetector {
            fail_from: Some(15),
            ..Default::default()
        };
        let mut sink = RecordingSink::default();

        let err = pipeline
            .run(
                &mut FakeSource::new(30),
                &mut detector,
                &StampAnnotator,
                &mut sink,
                &NoProgress,
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::Detection { frame_index: 15, .. }));
        assert!(!sink.finished);
        assert_eq!(sink.frames.len(), 15);
    }

    #[test]
    fn test_detector_failure_with_skip_interval() {
        let mut detector = FakeDetector {
            fail_from: Some(15),
            ..Default::default()
        };
        let mut sink = RecordingSink::default();

        let err = VideoAnnotationPipeline::new()
            .run(
                &mut FakeSource::new(30),
                &mut detector,
                &StampAnnotator,
                &mut sink,
                &NoProgress,
            )
            .unwrap_err();

        // First detector call at or after frame 15 is frame 20
        assert!(matches!(err, PipelineError::Detection { frame_index: 20, .. }));
        assert_eq!(detector.calls, vec![0, 10]);
        assert!(!sink.finished);
    }

    #[test]
    fn test_decode_failure_aborts_run() {
        let mut source = FakeSource::new(30);
        source.fail_at = Some(7);
        let mut sink = RecordingSink::default();

        let err = VideoAnnotationPipeline::new()
            .run(
                &mut source,
                &mut FakeDetector::default(),
                &StampAnnotator,
                &mut sink,
                &NoProgress,
            )
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Decode(DecodeError::Read { frame_index: 7, .. })
        ));
        assert!(!sink.finished);
    }
}
