//! Canned service payloads shared by the integration tests

#![allow(dead_code)]

use apple_counter::models::job::{JobResult, JobStatus, JobStatusSnapshot};
use serde_json::{json, Value};

pub const JOB_ID: &str = "abc123";

/// 17 apples over a fully processed 300-frame video.
pub const ORCHARD_RESULT: JobResult = JobResult {
    apple_count: 17,
    frames_processed: 300,
    total_frames: 300,
};

pub fn submit_body(job_id: &str) -> Value {
    json!({ "job_id": job_id, "status": "queued" })
}

pub fn processing_body(progress: u8) -> Value {
    json!({ "status": "processing", "progress": progress })
}

pub fn completed_body() -> Value {
    json!({
        "status": "completed",
        "progress": 100,
        "result": {
            "apple_count": ORCHARD_RESULT.apple_count,
            "frames_processed": ORCHARD_RESULT.frames_processed,
            "total_frames": ORCHARD_RESULT.total_frames
        },
        "video_path": "/videos/abc123_annotated.mp4"
    })
}

pub fn queued() -> JobStatusSnapshot {
    snapshot(JobStatus::Queued, 0)
}

pub fn processing(progress: u8) -> JobStatusSnapshot {
    snapshot(JobStatus::Processing, progress)
}

pub fn completed(result: Option<JobResult>) -> JobStatusSnapshot {
    JobStatusSnapshot {
        result,
        ..snapshot(JobStatus::Completed, 100)
    }
}

pub fn failed(error: Option<&str>) -> JobStatusSnapshot {
    JobStatusSnapshot {
        error: error.map(str::to_string),
        ..snapshot(JobStatus::Failed, 0)
    }
}

fn snapshot(status: JobStatus, progress: u8) -> JobStatusSnapshot {
    JobStatusSnapshot {
        status,
        progress,
        result: None,
        video_path: None,
        error: None,
    }
}
