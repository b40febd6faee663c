use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::app_state::Shared;
use crate::models::job::{JobHandle, JobStatus, JobStatusSnapshot};
use crate::models::notification::Notification;
use crate::models::session::SessionState;

const UNKNOWN_FAILURE: &str = "Unknown error occurred during processing";

/// Polling cadence and how it degrades when the service is unreachable.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub base_interval: Duration,
    pub backoff_step: Duration,
    pub max_interval: Duration,
    pub alert_every: u32,
}

impl PollPolicy {
    /// Delay before the next check after `consecutive_errors` failures in a row.
    ///
    /// Non-decreasing in the error count, never below the base interval and
    /// never above the cap.
    pub fn delay_after(&self, consecutive_errors: u32) -> Duration {
        let cap = self.max_interval.max(self.base_interval);
        self.base_interval
            .saturating_add(self.backoff_step.saturating_mul(consecutive_errors))
            .min(cap)
    }

    /// Whether this failure should raise a connectivity warning.
    pub fn should_alert(&self, consecutive_errors: u32) -> bool {
        self.alert_every > 0 && consecutive_errors > 0 && consecutive_errors % self.alert_every == 0
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Poll `job` until it completes, fails, or the task is cancelled.
///
/// Failed status checks never end polling; they only stretch the delay.
/// There is a single sleep outstanding at any time.
pub(crate) async fn run(
    shared: Arc<Shared>,
    generation: u64,
    cancel: CancellationToken,
    job: JobHandle,
) {
    let policy = shared.config.poll.clone();
    let mut consecutive_errors: u32 = 0;

    tracing::info!(session_id = %shared.id, job_id = %job, "Polling job status");

    loop {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            fetched = shared.service.fetch_status(&job) => fetched,
        };
        metrics::counter!("status_polls_total").increment(1);

        let delay = match fetched {
            Ok(snapshot) => {
                consecutive_errors = 0;
                match apply_snapshot(&shared, generation, &job, snapshot) {
                    Flow::Continue => policy.base_interval,
                    Flow::Stop => {
                        shared.finish(generation);
                        return;
                    }
                }
            }
            Err(e) => {
                consecutive_errors = consecutive_errors.saturating_add(1);
                metrics::counter!("status_poll_failures_total").increment(1);
                tracing::warn!(
                    job_id = %job,
                    error_count = consecutive_errors,
                    error = %e,
                    "Status check failed, will retry"
                );

                let alert = policy.should_alert(consecutive_errors);
                let current = shared.update_and_notify(generation, |state| {
                    if let SessionState::Processing { error_count, .. } = state {
                        *error_count = consecutive_errors;
                    }
                    alert.then(|| {
                        Notification::warning(
                            "Connection problems",
                            "We're having trouble connecting to the server. \
                             Your analysis may continue in the background.",
                        )
                    })
                });
                if !current {
                    return;
                }
                policy.delay_after(consecutive_errors)
            }
        };

        metrics::gauge!("status_poll_delay_ms").set(delay.as_millis() as f64);
        tracing::debug!(job_id = %job, delay_ms = delay.as_millis() as u64, "Next status check scheduled");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = sleep(delay) => {}
        }
    }
}

fn apply_snapshot(
    shared: &Shared,
    generation: u64,
    job: &JobHandle,
    snapshot: JobStatusSnapshot,
) -> Flow {
    match snapshot.status {
        JobStatus::Completed => {
            let notification = match &snapshot.result {
                Some(result) => {
                    if !result.is_consistent() {
                        tracing::warn!(
                            job_id = %job,
                            frames_processed = result.frames_processed,
                            total_frames = result.total_frames,
                            "Result frame counts are inconsistent"
                        );
                    }
                    tracing::info!(
                        job_id = %job,
                        apple_count = result.apple_count,
                        video_path = ?snapshot.video_path,
                        "Analysis complete"
                    );
                    Notification::success(
                        "Analysis complete",
                        format!("We found {} apples in your video!", result.apple_count),
                    )
                }
                None => {
                    tracing::info!(job_id = %job, "Analysis complete without a result");
                    Notification::info(
                        "Analysis complete",
                        "Analysis finished but no results were found",
                    )
                }
            };

            if shared.update_and_notify(generation, |state| {
                *state = SessionState::Completed {
                    job: job.clone(),
                    result: snapshot.result,
                };
                Some(notification)
            }) {
                metrics::counter!("jobs_completed_total").increment(1);
            }
            Flow::Stop
        }
        JobStatus::Failed => {
            let message = snapshot
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_FAILURE.to_string());
            tracing::error!(job_id = %job, error = %message, "Analysis failed");

            if shared.update_and_notify(generation, |state| {
                *state = SessionState::Errored {
                    job: Some(job.clone()),
                    message: message.clone(),
                };
                Some(Notification::error("Processing failed", message))
            }) {
                metrics::counter!("jobs_failed_total").increment(1);
            }
            Flow::Stop
        }
        JobStatus::Queued | JobStatus::Processing => {
            let current = shared.update(generation, |state| match state {
                SessionState::Processing {
                    progress,
                    error_count,
                    ..
                } => {
                    let changed = *progress != snapshot.progress || *error_count != 0;
                    *progress = snapshot.progress;
                    *error_count = 0;
                    changed
                }
                _ => false,
            });
            if current {
                Flow::Continue
            } else {
                Flow::Stop
            }
        }
    }
}
