use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

#[derive(Debug, Clone, Copy, Serialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-facing message (toast) raised by the session.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub issued_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(severity: Severity, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
            issued_at: Utc::now(),
        }
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Severity::Info, title, description)
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Severity::Success, title, description)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title, description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Severity::Error, title, description)
    }
}
