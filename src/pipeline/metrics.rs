// src/pipeline/metrics.rs
//
// Counters for one processing run. Shared handles so a status reader on
// another thread can look at a run in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub frames_decoded: Arc<AtomicU64>,
    pub frames_written: Arc<AtomicU64>,
    pub detector_runs: Arc<AtomicU64>,
    pub detections: Arc<AtomicU64>,
    pub detect_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            frames_decoded: Arc::new(AtomicU64::new(0)),
            frames_written: Arc::new(AtomicU64::new(0)),
            detector_runs: Arc::new(AtomicU64::new(0)),
            detections: Arc::new(AtomicU64::new(0)),
            detect_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.frames_written.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let detector_runs = self.detector_runs.load(Ordering::Relaxed);
        let detect_time_us = self.detect_time_us.load(Ordering::Relaxed);
        MetricsSummary {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_written: self.frames_written.load(Ordering::Relaxed),
            detector_runs,
            detections: self.detections.load(Ordering::Relaxed),
            avg_detect_us: if detector_runs > 0 {
                detect_time_us / detector_runs
            } else {
                0
            },
            fps: self.fps(),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames_decoded: u64,
    pub frames_written: u64,
    pub detector_runs: u64,
    pub detections: u64,
    pub avg_detect_us: u64,
    pub fps: f64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_averages_detect_time() {
        let metrics = PipelineMetrics::new();
        metrics.inc(&metrics.detector_runs);
        metrics.inc(&metrics.detector_runs);
        metrics.add(&metrics.detect_time_us, 3000);
        metrics.add(&metrics.detections, 5);

        let summary = metrics.summary();
        assert_eq!(summary.detector_runs, 2);
        assert_eq!(summary.avg_detect_us, 1500);
        assert_eq!(summary.detections, 5);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = PipelineMetrics::new();
        let reader = metrics.clone();
        metrics.inc(&metrics.frames_written);
        assert_eq!(reader.summary().frames_written, 1);
        assert_eq!(PipelineMetrics::default().summary().avg_detect_us, 0);
    }
}
