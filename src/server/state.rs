// src/server/state.rs

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{error, info};

use super::error::ApiError;
use crate::pipeline::{MetricsSummary, ProgressSink, ProgressUpdate};
use crate::service::AnnotationService;
use crate::upload::OutputVideo;

pub const UPLOADED_MESSAGE: &str = "Video uploaded. Running detection...";
pub const COMPLETE_MESSAGE: &str = "Detection complete!";

/// Where the single processing slot stands.
#[derive(Debug)]
pub enum RunState {
    Idle,
    Processing { progress: ProgressUpdate },
    Completed { output: OutputVideo, summary: MetricsSummary },
    Failed { message: String },
}

#[derive(Debug)]
struct Session {
    run_id: u64,
    state: RunState,
}

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone. Holds exactly one session: a new upload replaces the
/// previous result, and a second upload during processing is refused.
#[derive(Clone)]
pub struct AppState {
    service: Arc<dyn AnnotationService>,
    session: Arc<Mutex<Session>>,
    temp_dir: Arc<PathBuf>,
}

/// JSON view of the session for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub state: &'static str,
    pub percent: Option<u8>,
    pub frames_processed: u64,
    pub total_frames: Option<u64>,
    pub message: String,
    pub summary: Option<MetricsSummary>,
    pub download_url: Option<&'static str>,
}

impl AppState {
    pub fn new(service: Arc<dyn AnnotationService>, temp_dir: PathBuf) -> Self {
        Self {
            service,
            session: Arc::new(Mutex::new(Session {
                run_id: 0,
                state: RunState::Idle,
            })),
            temp_dir: Arc::new(temp_dir),
        }
    }

    pub fn service(&self) -> Arc<dyn AnnotationService> {
        Arc::clone(&self.service)
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 409 while a run is in progress. Checked before an upload body is
    /// read, and again when the slot is claimed.
    pub fn ensure_idle(&self) -> Result<(), ApiError> {
        Self::check_idle(&self.session())
    }

    fn check_idle(session: &Session) -> Result<(), ApiError> {
        if matches!(session.state, RunState::Processing { .. }) {
            return Err(ApiError::Conflict(
                "A video is already being processed".to_string(),
            ));
        }
        Ok(())
    }

    /// Claim the processing slot. Discards any previous result.
    pub fn begin_run(&self) -> Result<u64, ApiError> {
        let mut session = self.session();
        Self::check_idle(&session)?;

        session.run_id += 1;
        session.state = RunState::Processing {
            progress: ProgressUpdate::new(0, None),
        };
        info!("Run {} started", session.run_id);
        Ok(session.run_id)
    }

    pub fn progress_sink(&self, run_id: u64) -> RunProgress {
        RunProgress {
            session: Arc::clone(&self.session),
            run_id,
        }
    }

    pub fn complete_run(&self, run_id: u64, output: OutputVideo, summary: MetricsSummary) {
        let mut session = self.session();
        if session.run_id != run_id {
            return;
        }
        info!(
            "✅ Run {} complete: {} frames, {} detector runs",
            run_id, summary.frames_written, summary.detector_runs
        );
        session.state = RunState::Completed { output, summary };
    }

    /// Marks the run failed. No partial output is kept.
    pub fn fail_run(&self, run_id: u64, message: String) {
        let mut session = self.session();
        if session.run_id != run_id {
            return;
        }
        error!("Run {} failed: {}", run_id, message);
        session.state = RunState::Failed { message };
    }

    /// Path of the finished video, if the last run completed.
    pub fn output_path(&self) -> Option<PathBuf> {
        match &self.session().state {
            RunState::Completed { output, .. } => Some(output.path().to_path_buf()),
            _ => None,
        }
    }

    pub fn status(&self) -> RunStatus {
        match &self.session().state {
            RunState::Idle => RunStatus {
                state: "idle",
                percent: None,
                frames_processed: 0,
                total_frames: None,
                message: "Upload a video file".to_string(),
                summary: None,
                download_url: None,
            },
            RunState::Processing { progress } => RunStatus {
                state: "processing",
                percent: progress.percent,
                frames_processed: progress.frames_done,
                total_frames: progress.total_frames,
                message: if progress.frames_done == 0 {
                    UPLOADED_MESSAGE.to_string()
                } else {
                    progress.status_text()
                },
                summary: None,
                download_url: None,
            },
            RunState::Completed { summary, .. } => RunStatus {
                state: "completed",
                percent: Some(100),
                frames_processed: summary.frames_written,
                total_frames: Some(summary.frames_written),
                message: COMPLETE_MESSAGE.to_string(),
                summary: Some(summary.clone()),
                download_url: Some("/api/download"),
            },
            RunState::Failed { message } => RunStatus {
                state: "failed",
                percent: None,
                frames_processed: 0,
                total_frames: None,
                message: message.clone(),
                summary: None,
                download_url: None,
            },
        }
    }
}

/// Progress sink bound to one run. Updates for a superseded run are dropped.
pub struct RunProgress {
    session: Arc<Mutex<Session>>,
    run_id: u64,
}

impl ProgressSink for RunProgress {
    fn report(&self, update: ProgressUpdate) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.run_id != self.run_id {
            return;
        }
        if let RunState::Processing { progress } = &mut session.state {
            *progress = update;
        }
    }
}
