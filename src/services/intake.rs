//! File intake: turns a user's selection into an [`UploadRequest`].
//!
//! Selections that cannot be analysed are rejected here, with a
//! notification, so the session only ever sees a single video payload.

use std::path::{Path, PathBuf};

use crate::models::notification::Notification;
use crate::models::video::UploadRequest;
use crate::services::notify::NotificationSink;

/// Validate the first selected file and read it into memory.
pub async fn load_video(
    selection: &[PathBuf],
    notifier: &dyn NotificationSink,
) -> Result<UploadRequest, IntakeError> {
    let result = match selection.first() {
        Some(path) => read_video(path).await,
        None => Err(IntakeError::NoSelection),
    };

    if let Err(e) = &result {
        tracing::warn!(error = %e, "Rejected video selection");
        notifier.notify(e.notification());
    }

    result
}

/// Guess the MIME type of a path from its extension.
pub fn video_mime(path: &Path) -> Result<String, IntakeError> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::VIDEO {
        return Err(IntakeError::NotVideo {
            mime: mime.essence_str().to_string(),
        });
    }
    Ok(mime.essence_str().to_string())
}

async fn read_video(path: &Path) -> Result<UploadRequest, IntakeError> {
    let mime_type = video_mime(path)?;
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Err(IntakeError::EmptyFile);
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());

    tracing::info!(file_name = %file_name, mime = %mime_type, bytes = bytes.len(), "Video selected");
    Ok(UploadRequest::new(file_name, mime_type, bytes))
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("No file selected")]
    NoSelection,

    #[error("Not a video file ({mime})")]
    NotVideo { mime: String },

    #[error("Video file is empty")]
    EmptyFile,

    #[error("Failed to read video file: {0}")]
    Io(#[from] std::io::Error),
}

impl IntakeError {
    fn notification(&self) -> Notification {
        match self {
            IntakeError::NoSelection => {
                Notification::error("No file selected", "Please select a video file to upload.")
            }
            IntakeError::NotVideo { .. } => {
                Notification::error("Invalid file type", "Please upload a video file.")
            }
            IntakeError::EmptyFile => {
                Notification::error("Empty file", "The selected video file contains no data.")
            }
            IntakeError::Io(e) => Notification::error("Could not read file", e.to_string()),
        }
    }
}
