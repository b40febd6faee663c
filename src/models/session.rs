use serde::Serialize;
use strum::{Display, EnumString};

use crate::models::job::{JobHandle, JobResult};

/// Coarse status of the whole session, as shown to the user.
#[derive(Debug, Clone, Copy, Serialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AppStatus {
    Idle,
    Uploading,
    Processing,
    Completed,
    Error,
}

impl AppStatus {
    /// `completed` and `error` only change on reset or a new upload.
    pub fn is_terminal(self) -> bool {
        matches!(self, AppStatus::Completed | AppStatus::Error)
    }
}

/// Single source of truth for a session.
///
/// Every combination the UI can observe is a variant here, so there is no
/// way to be polling without a job handle or to hold a result while idle.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Uploading {
        progress: u8,
    },
    Processing {
        job: JobHandle,
        progress: u8,
        error_count: u32,
    },
    Completed {
        job: JobHandle,
        result: Option<JobResult>,
    },
    #[serde(rename = "error")]
    Errored {
        job: Option<JobHandle>,
        message: String,
    },
}

impl SessionState {
    pub fn status(&self) -> AppStatus {
        match self {
            SessionState::Idle => AppStatus::Idle,
            SessionState::Uploading { .. } => AppStatus::Uploading,
            SessionState::Processing { .. } => AppStatus::Processing,
            SessionState::Completed { .. } => AppStatus::Completed,
            SessionState::Errored { .. } => AppStatus::Error,
        }
    }

    /// Percentage shown on the progress bar.
    pub fn progress(&self) -> u8 {
        match self {
            SessionState::Idle | SessionState::Errored { .. } => 0,
            SessionState::Uploading { progress } | SessionState::Processing { progress, .. } => {
                *progress
            }
            SessionState::Completed { .. } => 100,
        }
    }

    pub fn job(&self) -> Option<&JobHandle> {
        match self {
            SessionState::Processing { job, .. } | SessionState::Completed { job, .. } => Some(job),
            SessionState::Errored { job, .. } => job.as_ref(),
            SessionState::Idle | SessionState::Uploading { .. } => None,
        }
    }

    pub fn result(&self) -> Option<&JobResult> {
        match self {
            SessionState::Completed { result, .. } => result.as_ref(),
            _ => None,
        }
    }

    /// Consecutive failed status checks while processing.
    pub fn error_count(&self) -> u32 {
        match self {
            SessionState::Processing { error_count, .. } => *error_count,
            _ => 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Title and subtitle of the progress card for this state.
    pub fn headline(&self) -> (&'static str, String) {
        match self {
            SessionState::Idle => (
                "Upload a video to begin",
                "Ready to analyze your apple trees".to_string(),
            ),
            SessionState::Uploading { .. } => (
                "Uploading Video",
                "Please wait while your video uploads...".to_string(),
            ),
            SessionState::Processing { job, .. } => (
                "Processing Video",
                format!("Analyzing video (Job ID: {job})"),
            ),
            SessionState::Completed { .. } => {
                ("Analysis Complete", "Your results are ready below".to_string())
            }
            SessionState::Errored { .. } => (
                "Error Occurred",
                "There was an issue processing your video".to_string(),
            ),
        }
    }
}
