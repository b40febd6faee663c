//! Scripted analysis service and session plumbing for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use apple_counter::models::job::{JobHandle, JobStatusSnapshot};
use apple_counter::models::notification::Notification;
use apple_counter::models::session::SessionState;
use apple_counter::models::video::UploadRequest;
use apple_counter::services::analysis::{AnalysisService, StatusFetchError, UploadError};
use apple_counter::services::notify::ChannelNotifier;
use apple_counter::{Session, SessionConfig};
use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout, Instant};

/// What the fake service answers to a submit.
#[derive(Debug, Clone)]
pub enum SubmitReply {
    Job(&'static str),
    Rejected(u16, &'static str),
    MissingJobId,
}

/// What the fake service answers to a status check.
#[derive(Debug, Clone)]
pub enum StatusReply {
    Snapshot(JobStatusSnapshot),
    Unreachable,
    Crash,
}

#[derive(Debug, Clone)]
struct StatusStep {
    delay: Duration,
    reply: StatusReply,
}

/// In-memory stand-in for the remote service.
///
/// Submit replies are consumed in order, the last one repeating. Status
/// replies work the same way.
pub struct FakeService {
    submit_delay: Duration,
    submits: Mutex<VecDeque<SubmitReply>>,
    statuses: Mutex<VecDeque<StatusStep>>,
    submit_calls: AtomicUsize,
    fetches: Mutex<Vec<(Instant, String)>>,
}

impl FakeService {
    pub fn new(submit: SubmitReply) -> Self {
        Self {
            submit_delay: Duration::from_millis(300),
            submits: Mutex::new(VecDeque::from([submit])),
            statuses: Mutex::new(VecDeque::new()),
            submit_calls: AtomicUsize::new(0),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn then_submit(self, reply: SubmitReply) -> Self {
        self.submits.lock().unwrap().push_back(reply);
        self
    }

    pub fn status(self, reply: StatusReply) -> Self {
        self.status_after(Duration::ZERO, reply)
    }

    pub fn status_after(self, delay: Duration, reply: StatusReply) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .push_back(StatusStep { delay, reply });
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    pub fn fetched_jobs(&self) -> Vec<String> {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .map(|(_, job)| job.clone())
            .collect()
    }

    /// Gaps between consecutive status checks.
    pub fn fetch_gaps(&self) -> Vec<Duration> {
        let fetches = self.fetches.lock().unwrap();
        fetches
            .windows(2)
            .map(|pair| pair[1].0.duration_since(pair[0].0))
            .collect()
    }

    fn next<T: Clone>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl AnalysisService for FakeService {
    async fn submit(&self, video: UploadRequest) -> Result<JobHandle, UploadError> {
        assert!(!video.is_empty());
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        sleep(self.submit_delay).await;

        match Self::next(&self.submits).expect("no submit reply scripted") {
            SubmitReply::Job(id) => Ok(JobHandle::new(id).expect("scripted job id is blank")),
            SubmitReply::Rejected(code, body) => Err(UploadError::Rejected {
                status: StatusCode::from_u16(code).unwrap(),
                body: body.to_string(),
            }),
            SubmitReply::MissingJobId => Err(UploadError::MissingJobId),
        }
    }

    async fn fetch_status(&self, job: &JobHandle) -> Result<JobStatusSnapshot, StatusFetchError> {
        self.fetches
            .lock()
            .unwrap()
            .push((Instant::now(), job.as_str().to_string()));
        let step = Self::next(&self.statuses).expect("no status reply scripted");
        sleep(step.delay).await;

        match step.reply {
            StatusReply::Snapshot(snapshot) => Ok(snapshot),
            StatusReply::Unreachable => Err(StatusFetchError::Rejected {
                status: StatusCode::BAD_GATEWAY,
                body: "upstream unavailable".to_string(),
            }),
            StatusReply::Crash => panic!("status handler crashed"),
        }
    }
}

pub struct Harness {
    pub session: Session,
    pub service: Arc<FakeService>,
    pub notifications: UnboundedReceiver<Notification>,
}

impl Harness {
    pub fn new(service: FakeService) -> Self {
        let service = Arc::new(service);
        let (notifier, notifications) = ChannelNotifier::new();
        let session = Session::new(
            service.clone(),
            Arc::new(notifier),
            SessionConfig::default(),
        );
        Self {
            session,
            service,
            notifications,
        }
    }

    /// Wait (in paused time) until the state satisfies `predicate`.
    pub async fn wait_until<F>(&self, predicate: F) -> SessionState
    where
        F: FnMut(&SessionState) -> bool,
    {
        let mut rx = self.session.subscribe();
        let state = timeout(Duration::from_secs(600), rx.wait_for(predicate))
            .await
            .expect("timed out waiting for session state")
            .expect("session state channel closed");
        state.clone()
    }

    /// Everything notified so far.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            drained.push(n);
        }
        drained
    }
}

pub fn sample_video() -> UploadRequest {
    UploadRequest::new("orchard.mp4", "video/mp4", vec![0, 0, 0, 24, b'f', b't', b'y', b'p'])
}

pub fn titles(notifications: &[Notification]) -> Vec<&str> {
    notifications.iter().map(|n| n.title.as_str()).collect()
}
