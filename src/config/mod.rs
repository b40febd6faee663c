use garde::Validate;
use serde::Deserialize;
use std::time::Duration;

use crate::services::poller::PollPolicy;
use crate::services::upload::UploadProgressPolicy;

/// Client configuration, read from `APPLE_COUNTER_*` environment variables.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    /// Endpoint accepting the multipart video upload.
    #[serde(default = "default_submit_url")]
    #[garde(url)]
    pub submit_url: String,

    /// Base URL for job status lookups; the job id is appended as a path segment.
    #[serde(default = "default_status_base_url")]
    #[garde(url)]
    pub status_base_url: String,

    /// Timeout for a single HTTP request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    #[garde(range(min = 1, max = 3600))]
    pub request_timeout_secs: u64,

    /// Tick of the synthetic upload progress bar.
    #[serde(default = "default_upload_tick_ms")]
    #[garde(range(min = 10, max = 10_000))]
    pub upload_tick_ms: u64,

    /// Percentage points added per upload tick.
    #[serde(default = "default_upload_step")]
    #[garde(range(min = 1, max = 50))]
    pub upload_step: u8,

    /// Synthetic upload progress never passes this value.
    #[serde(default = "default_upload_cap")]
    #[garde(range(min = 1, max = 99))]
    pub upload_cap: u8,

    /// Pause between a successful upload and the start of polling.
    #[serde(default = "default_handoff_delay_ms")]
    #[garde(range(max = 60_000))]
    pub handoff_delay_ms: u64,

    /// Delay between status checks while the service is reachable.
    #[serde(default = "default_poll_interval_ms")]
    #[garde(range(min = 100, max = 600_000))]
    pub poll_interval_ms: u64,

    /// Extra delay added per consecutive failed status check.
    #[serde(default = "default_poll_backoff_step_ms")]
    #[garde(range(max = 600_000))]
    pub poll_backoff_step_ms: u64,

    /// Upper bound on the delay between status checks.
    #[serde(default = "default_poll_max_interval_ms")]
    #[garde(custom(at_least_poll_interval(&self.poll_interval_ms)))]
    pub poll_max_interval_ms: u64,

    /// Warn about connectivity once every this many consecutive failures.
    #[serde(default = "default_alert_every")]
    #[garde(range(min = 1, max = 1000))]
    pub alert_every: u32,

    /// How often the front end checks that polling is still alive.
    #[serde(default = "default_watchdog_ms")]
    #[garde(range(min = 100))]
    pub watchdog_ms: u64,
}

fn at_least_poll_interval(poll_interval_ms: &u64) -> impl FnOnce(&u64, &()) -> garde::Result + '_ {
    move |max, _| {
        if max < poll_interval_ms {
            return Err(garde::Error::new(format!(
                "must be at least the poll interval ({poll_interval_ms} ms)"
            )));
        }
        Ok(())
    }
}

fn default_submit_url() -> String {
    "https://itemscounter.ticktick.cloud/submit_video/".to_string()
}

fn default_status_base_url() -> String {
    "http://159.223.234.220/job_status".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_upload_tick_ms() -> u64 {
    200
}

fn default_upload_step() -> u8 {
    5
}

fn default_upload_cap() -> u8 {
    95
}

fn default_handoff_delay_ms() -> u64 {
    500
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_poll_backoff_step_ms() -> u64 {
    1000
}

fn default_poll_max_interval_ms() -> u64 {
    8000
}

fn default_alert_every() -> u32 {
    5
}

fn default_watchdog_ms() -> u64 {
    10_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            submit_url: default_submit_url(),
            status_base_url: default_status_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            upload_tick_ms: default_upload_tick_ms(),
            upload_step: default_upload_step(),
            upload_cap: default_upload_cap(),
            handoff_delay_ms: default_handoff_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_backoff_step_ms: default_poll_backoff_step_ms(),
            poll_max_interval_ms: default_poll_max_interval_ms(),
            alert_every: default_alert_every(),
            watchdog_ms: default_watchdog_ms(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::prefixed("APPLE_COUNTER_").from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn watchdog_period(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            upload: UploadProgressPolicy {
                tick: Duration::from_millis(self.upload_tick_ms),
                step: self.upload_step,
                cap: self.upload_cap,
            },
            handoff_delay: Duration::from_millis(self.handoff_delay_ms),
            poll: PollPolicy {
                base_interval: Duration::from_millis(self.poll_interval_ms),
                backoff_step: Duration::from_millis(self.poll_backoff_step_ms),
                max_interval: Duration::from_millis(self.poll_max_interval_ms),
                alert_every: self.alert_every,
            },
        }
    }
}

/// Timing knobs for a [`crate::app_state::Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub upload: UploadProgressPolicy,
    pub handoff_delay: Duration,
    pub poll: PollPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        AppConfig::default().session_config()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}
