use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque identifier the analysis service assigns to a submitted video.
///
/// Always non-empty; a submit response without an identifier is an error,
/// never an empty handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    /// Wrap a raw identifier, rejecting blank strings.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of an analysis job as reported by the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Counting result attached to a completed job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct JobResult {
    #[garde(skip)]
    pub apple_count: u64,

    #[garde(skip)]
    pub frames_processed: u64,

    #[garde(range(min = 1))]
    pub total_frames: u64,
}

impl JobResult {
    /// Share of frames analysed, as a whole percentage in `0..=100`.
    pub fn frame_progress_percent(&self) -> u8 {
        if self.total_frames == 0 {
            return 0;
        }
        let ratio = self.frames_processed as f64 / self.total_frames as f64;
        (ratio * 100.0).round().clamp(0.0, 100.0) as u8
    }

    /// Whether the frame counters are consistent with each other.
    pub fn is_consistent(&self) -> bool {
        self.validate().is_ok() && self.frames_processed <= self.total_frames
    }
}

/// Response body of the submit endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitVideoResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One status sample for a job. Only the most recent one matters.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct JobStatusSnapshot {
    pub status: JobStatus,

    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: u8,

    #[serde(default)]
    pub result: Option<JobResult>,

    #[serde(default)]
    pub video_path: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

/// The service reports progress as a JSON number; accept floats, nulls and
/// out-of-range values and clamp them into a percentage.
fn deserialize_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<f64> = Option::deserialize(deserializer)?;
    Ok(raw
        .filter(|p| p.is_finite())
        .map(|p| p.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_handle_rejected() {
        assert!(JobHandle::new("").is_none());
        assert!(JobHandle::new("   ").is_none());
        assert_eq!(JobHandle::new("abc123").unwrap().as_str(), "abc123");
    }

    #[test]
    fn test_frame_progress_full() {
        let result = JobResult {
            apple_count: 17,
            frames_processed: 300,
            total_frames: 300,
        };
        assert_eq!(result.frame_progress_percent(), 100);
        assert!(result.is_consistent());
    }

    #[test]
    fn test_frame_progress_rounds() {
        let result = JobResult {
            apple_count: 3,
            frames_processed: 1,
            total_frames: 3,
        };
        assert_eq!(result.frame_progress_percent(), 33);
    }

    #[test]
    fn test_frame_progress_stays_in_range() {
        for total in 1..40u64 {
            for processed in 0..=total {
                let result = JobResult {
                    apple_count: 0,
                    frames_processed: processed,
                    total_frames: total,
                };
                assert!(result.frame_progress_percent() <= 100);
            }
        }
    }

    #[test]
    fn test_inconsistent_result_is_clamped() {
        let result = JobResult {
            apple_count: 1,
            frames_processed: 500,
            total_frames: 300,
        };
        assert!(!result.is_consistent());
        assert_eq!(result.frame_progress_percent(), 100);

        let empty = JobResult {
            apple_count: 0,
            frames_processed: 0,
            total_frames: 0,
        };
        assert!(!empty.is_consistent());
        assert_eq!(empty.frame_progress_percent(), 0);
    }

    #[test]
    fn test_snapshot_defaults() {
        let snapshot: JobStatusSnapshot =
            serde_json::from_str(r#"{"status":"queued"}"#).unwrap();
        assert_eq!(snapshot.status, JobStatus::Queued);
        assert_eq!(snapshot.progress, 0);
        assert!(snapshot.result.is_none());
    }

    #[test]
    fn test_snapshot_progress_clamped() {
        let snapshot: JobStatusSnapshot =
            serde_json::from_str(r#"{"status":"processing","progress":142.6}"#).unwrap();
        assert_eq!(snapshot.progress, 100);

        let snapshot: JobStatusSnapshot =
            serde_json::from_str(r#"{"status":"processing","progress":null}"#).unwrap();
        assert_eq!(snapshot.progress, 0);
    }

    #[test]
    fn test_completed_snapshot_with_result() {
        let body = r#"{
            "status": "completed",
            "progress": 100,
            "result": {"apple_count": 17, "frames_processed": 300, "total_frames": 300},
            "video_path": "/videos/abc123.mp4"
        }"#;
        let snapshot: JobStatusSnapshot = serde_json::from_str(body).unwrap();
        assert!(snapshot.status.is_terminal());
        assert_eq!(snapshot.result.unwrap().apple_count, 17);
        assert_eq!(snapshot.video_path.as_deref(), Some("/videos/abc123.mp4"));
    }

    #[test]
    fn test_status_display_matches_wire() {
        assert_eq!(JobStatus::Failed.to_string(), "failed");
        assert_eq!("processing".parse::<JobStatus>().unwrap(), JobStatus::Processing);
    }
}
