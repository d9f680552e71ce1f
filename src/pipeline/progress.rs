// src/pipeline/progress.rs

use serde::Serialize;

/// Percent complete, floored and capped at 100.
///
/// `None` when the container did not report a frame count: progress is
/// indeterminate, there is nothing to divide by.
pub fn progress_percent(frames_done: u64, total_frames: Option<u64>) -> Option<u8> {
    match total_frames {
        Some(total) if total > 0 => {
            let pct = (frames_done.saturating_mul(100) / total).min(100);
            Some(pct as u8)
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub frames_done: u64,
    pub total_frames: Option<u64>,
    pub percent: Option<u8>,
}

impl ProgressUpdate {
    pub fn new(frames_done: u64, total_frames: Option<u64>) -> Self {
        Self {
            frames_done,
            total_frames,
            percent: progress_percent(frames_done, total_frames),
        }
    }

    /// `"Processing frame 12 of 300"`
    pub fn status_text(&self) -> String {
        match self.total_frames {
            Some(total) => format!("Processing frame {} of {}", self.frames_done, total),
            None => format!("Processing frame {}", self.frames_done),
        }
    }
}

/// Receives one update per emitted frame.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Discards updates.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: ProgressUpdate) {}
}
