use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::app_state::Shared;
use crate::models::notification::Notification;
use crate::models::session::SessionState;
use crate::models::video::UploadRequest;
use crate::services::poller;

/// Synthetic progress shown while the upload request is in flight.
///
/// The service gives no upload progress, so the bar creeps forward on a
/// timer and stops short of the end until the response arrives.
#[derive(Debug, Clone)]
pub struct UploadProgressPolicy {
    pub tick: Duration,
    pub step: u8,
    pub cap: u8,
}

impl UploadProgressPolicy {
    pub fn advance(&self, progress: u8) -> u8 {
        if progress >= self.cap {
            return progress;
        }
        progress.saturating_add(self.step).min(self.cap)
    }
}

/// Submit the video, then hand the job to the poller.
pub(crate) async fn run(
    shared: Arc<Shared>,
    generation: u64,
    cancel: CancellationToken,
    video: UploadRequest,
) {
    metrics::counter!("video_uploads_total").increment(1);
    let policy = shared.config.upload.clone();

    let outcome = {
        let mut submit = shared.service.submit(video);
        let mut ticker = interval_at(Instant::now() + policy.tick, policy.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                outcome = &mut submit => break outcome,
                _ = ticker.tick() => {
                    shared.update(generation, |state| match state {
                        SessionState::Uploading { progress } => {
                            let next = policy.advance(*progress);
                            let changed = next != *progress;
                            *progress = next;
                            changed
                        }
                        _ => false,
                    });
                }
            }
        }
    };

    let job = match outcome {
        Ok(job) => job,
        Err(e) => {
            metrics::counter!("video_uploads_failed_total").increment(1);
            tracing::error!(session_id = %shared.id, error = %e, "Upload failed");
            let message = e.to_string();
            shared.update_and_notify(generation, |state| {
                *state = SessionState::Errored {
                    job: None,
                    message: message.clone(),
                };
                Some(Notification::error("Upload failed", message))
            });
            shared.finish(generation);
            return;
        }
    };

    tracing::info!(session_id = %shared.id, job_id = %job, "Video uploaded");
    let current = shared.update_and_notify(generation, |state| {
        *state = SessionState::Uploading { progress: 100 };
        Some(Notification::success(
            "Video uploaded successfully",
            format!("Processing has started with Job ID: {job}"),
        ))
    });
    if !current {
        return;
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        _ = sleep(shared.config.handoff_delay) => {}
    }

    if shared.begin_processing(generation, job.clone()) {
        poller::run(shared, generation, cancel, job).await;
    }
}
