// src/pipeline/mod.rs

pub mod metrics;
pub mod orchestrator;
pub mod progress;

pub use metrics::{MetricsSummary, PipelineMetrics};
pub use orchestrator::VideoAnnotationPipeline;
pub use progress::{progress_percent, NoProgress, ProgressSink, ProgressUpdate};
