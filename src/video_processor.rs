// src/video_processor.rs

use crate::error::{DecodeError, EncodeError};
use crate::types::{Frame, VideoMetadata};

/// Lazy, finite frame sequence. Not restartable: reopen to read again.
pub trait FrameSource {
    fn metadata(&self) -> VideoMetadata;

    /// `Ok(None)` once the stream is exhausted.
    fn read_frame(&mut self) -> Result<Option<Frame>, DecodeError>;
}

/// Append-only encoded output.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), EncodeError>;

    /// Flush and close the container. Called once, after the last frame.
    fn finish(&mut self) -> Result<(), EncodeError>;
}

#[cfg(feature = "opencv")]
pub use cv::{VideoProcessor, VideoReader, VideoWriter};

#[cfg(feature = "opencv")]
mod cv {
    use super::{FrameSink, FrameSource};
    use crate::error::{DecodeError, EncodeError};
    use crate::types::{Frame, VideoConfig, VideoMetadata};
    use opencv::{
        core::{self, Mat},
        prelude::*,
        videoio::{self, VideoCapture},
    };
    use std::path::Path;
    use tracing::{info, warn};

    pub struct VideoProcessor {
        config: VideoConfig,
    }

    impl VideoProcessor {
        pub fn new(config: VideoConfig) -> Self {
            Self { config }
        }

        pub fn open_video(&self, path: &Path) -> Result<VideoReader, DecodeError> {
            info!("Opening video: {}", path.display());

            let open_err = |reason: String| DecodeError::Open {
                path: path.display().to_string(),
                reason,
            };

            let path_str = path
                .to_str()
                .ok_or_else(|| open_err("path is not valid UTF-8".to_string()))?;

            let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)
                .map_err(|e| open_err(e.to_string()))?;

            if !cap.is_opened().map_err(|e| open_err(e.to_string()))? {
                return Err(open_err("no decoder could open the file".to_string()));
            }

            let prop = |id: i32| cap.get(id).map_err(|e| open_err(e.to_string()));
            let fps = prop(videoio::CAP_PROP_FPS)?;
            let raw_frames = prop(videoio::CAP_PROP_FRAME_COUNT)?;
            let width = prop(videoio::CAP_PROP_FRAME_WIDTH)? as usize;
            let height = prop(videoio::CAP_PROP_FRAME_HEIGHT)? as usize;

            let metadata = VideoMetadata {
                fps,
                width,
                height,
                total_frames: VideoMetadata::frame_count_from_container(raw_frames),
            };

            info!(
                "Video properties: {}x{} @ {:.1} FPS, {} frames",
                width,
                height,
                fps,
                metadata
                    .total_frames
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );

            Ok(VideoReader {
                cap,
                metadata,
                frames_read: 0,
            })
        }

        pub fn create_writer(
            &self,
            output_path: &Path,
            metadata: &VideoMetadata,
        ) -> Result<VideoWriter, EncodeError> {
            let open_err = |reason: String| EncodeError::Open {
                path: output_path.display().to_string(),
                reason,
            };

            let path_str = output_path
                .to_str()
                .ok_or_else(|| open_err("path is not valid UTF-8".to_string()))?;

            let fps = if metadata.fps.is_finite() && metadata.fps > 0.0 {
                metadata.fps
            } else {
                warn!(
                    "Container reports no frame rate, writing at {:.1} FPS",
                    self.config.fallback_fps
                );
                self.config.fallback_fps
            };

            let mut tag = self.config.fourcc.chars();
            let (a, b, c, d) = match (tag.next(), tag.next(), tag.next(), tag.next(), tag.next()) {
                (Some(a), Some(b), Some(c), Some(d), None) => (a, b, c, d),
                _ => {
                    return Err(open_err(format!(
                        "fourcc '{}' must be exactly four characters",
                        self.config.fourcc
                    )))
                }
            };
            let fourcc =
                videoio::VideoWriter::fourcc(a, b, c, d).map_err(|e| open_err(e.to_string()))?;

            info!(
                "Output video: {} ({}x{} @ {:.1} FPS, {})",
                output_path.display(),
                metadata.width,
                metadata.height,
                fps,
                self.config.fourcc
            );

            let writer = videoio::VideoWriter::new(
                path_str,
                fourcc,
                fps,
                core::Size::new(metadata.width as i32, metadata.height as i32),
                true,
            )
            .map_err(|e| open_err(e.to_string()))?;

            if !writer.is_opened().map_err(|e| open_err(e.to_string()))? {
                return Err(open_err("no encoder accepted the output settings".to_string()));
            }

            Ok(VideoWriter {
                writer,
                width: metadata.width,
                height: metadata.height,
                frames_written: 0,
            })
        }
    }

    /// Capture handle. Released on drop.
    pub struct VideoReader {
        cap: VideoCapture,
        metadata: VideoMetadata,
        frames_read: u64,
    }

    impl FrameSource for VideoReader {
        fn metadata(&self) -> VideoMetadata {
            self.metadata
        }

        fn read_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
            let read_err = |frame_index: u64, e: opencv::Error| DecodeError::Read {
                frame_index,
                reason: e.to_string(),
            };

            let mut mat = Mat::default();
            let index = self.frames_read;

            if !self.cap.read(&mut mat).map_err(|e| read_err(index, e))? || mat.empty() {
                return Ok(None);
            }

            // Decoders hand back continuous BGR24; anything else is unusable
            if mat.typ() != core::CV_8UC3 {
                return Err(DecodeError::Read {
                    frame_index: index,
                    reason: format!("unexpected pixel type {}", mat.typ()),
                });
            }

            let data = mat.data_bytes().map_err(|e| read_err(index, e))?.to_vec();
            let timestamp_ms = if self.metadata.fps > 0.0 {
                (index as f64 / self.metadata.fps) * 1000.0
            } else {
                0.0
            };
            self.frames_read += 1;

            Ok(Some(Frame {
                data,
                width: mat.cols() as usize,
                height: mat.rows() as usize,
                index,
                timestamp_ms,
            }))
        }
    }

    /// Encoder handle. Released on `finish` or on drop.
    pub struct VideoWriter {
        writer: videoio::VideoWriter,
        width: usize,
        height: usize,
        frames_written: u64,
    }

    impl FrameSink for VideoWriter {
        fn write_frame(&mut self, frame: &Frame) -> Result<(), EncodeError> {
            let write_err = |reason: String| EncodeError::Write {
                frame_index: frame.index,
                reason,
            };

            if frame.width != self.width || frame.height != self.height {
                return Err(write_err(format!(
                    "frame is {}x{}, output is {}x{}",
                    frame.width, frame.height, self.width, self.height
                )));
            }

            let mat = Mat::from_slice(&frame.data).map_err(|e| write_err(e.to_string()))?;
            let mat = mat
                .reshape(3, frame.height as i32)
                .map_err(|e| write_err(e.to_string()))?;

            self.writer
                .write(&*mat)
                .map_err(|e| write_err(e.to_string()))?;
            self.frames_written += 1;
            Ok(())
        }

        fn finish(&mut self) -> Result<(), EncodeError> {
            self.writer
                .release()
                .map_err(|e| EncodeError::Finalize(e.to_string()))?;
            info!("✓ Output finalized ({} frames)", self.frames_written);
            Ok(())
        }
    }
}
