use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::models::job::JobHandle;
use crate::models::notification::Notification;
use crate::models::session::{AppStatus, SessionState};
use crate::models::video::UploadRequest;
use crate::services::analysis::AnalysisService;
use crate::services::notify::NotificationSink;
use crate::services::{poller, upload};

/// What the session's background task is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Upload,
    Poll,
}

/// One upload-or-poll session against the analysis service.
///
/// The session owns at most one background task at a time. Starting an
/// upload, resetting, or dropping the session cancels that task before
/// anything else happens, and every state change a task makes is checked
/// against the generation it was started with, so a superseded task can
/// never write to the state.
pub struct Session {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    pub(crate) id: Uuid,
    pub(crate) service: Arc<dyn AnalysisService>,
    pub(crate) config: SessionConfig,
    notifier: Arc<dyn NotificationSink>,
    state: watch::Sender<SessionState>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    generation: u64,
    activity: Option<Activity>,
}

struct Activity {
    kind: ActivityKind,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Activity {
    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }

    fn stop(self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

impl Session {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        notifier: Arc<dyn NotificationSink>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                service,
                config,
                notifier,
                state,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    pub fn status(&self) -> AppStatus {
        self.shared.state.borrow().status()
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Kind of the background task that is still running, if any.
    pub fn activity(&self) -> Option<ActivityKind> {
        let inner = self.shared.lock();
        inner
            .activity
            .as_ref()
            .filter(|a| a.is_live())
            .map(|a| a.kind)
    }

    /// Upload `video` and follow the resulting job until it finishes.
    ///
    /// Whatever the session was doing before is cancelled; its job handle
    /// and results are discarded.
    pub fn start_upload(&self, video: UploadRequest) {
        let mut inner = self.shared.lock();
        tracing::info!(
            session_id = %self.shared.id,
            file_name = %video.file_name,
            bytes = video.len(),
            "Starting upload"
        );

        self.launch(&mut inner, ActivityKind::Upload, move |shared, generation, cancel| {
            upload::run(shared, generation, cancel, video)
        });
        self.shared.state.send_replace(SessionState::Uploading { progress: 0 });
        self.shared.notifier.notify(Notification::info(
            "Uploading video",
            "Your video is being sent for analysis.",
        ));
    }

    /// Return to idle, cancelling any upload or polling in progress.
    pub fn reset(&self) {
        let mut inner = self.shared.lock();
        inner.stop_activity();
        self.shared.state.send_replace(SessionState::Idle);
        tracing::info!(session_id = %self.shared.id, "Session reset");
    }

    /// Restart polling if the session is processing but nothing is polling.
    ///
    /// Returns `true` when a new poller was started. Calling this while a
    /// poller (or the upload that will hand off to one) is running is a no-op.
    pub fn ensure_polling(&self) -> bool {
        let mut inner = self.shared.lock();
        if inner.activity.as_ref().is_some_and(Activity::is_live) {
            return false;
        }

        let job = match &*self.shared.state.borrow() {
            SessionState::Processing { job, .. } => job.clone(),
            _ => return false,
        };

        tracing::warn!(session_id = %self.shared.id, job_id = %job, "Polling was inactive, restarting");
        self.launch(&mut inner, ActivityKind::Poll, move |shared, generation, cancel| {
            poller::run(shared, generation, cancel, job)
        });
        true
    }

    /// Wait until the session reaches `completed` or `error`.
    pub async fn wait_for_terminal(&self) -> SessionState {
        let mut rx = self.subscribe();
        let state = match rx.wait_for(SessionState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    fn launch<F, Fut>(&self, inner: &mut Inner, kind: ActivityKind, task: F)
    where
        F: FnOnce(Arc<Shared>, u64, CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        inner.stop_activity();
        let cancel = CancellationToken::new();
        let fut = task(Arc::clone(&self.shared), inner.generation, cancel.clone());
        inner.activity = Some(Activity {
            kind,
            cancel,
            task: tokio::spawn(fut),
        });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.lock().stop_activity();
    }
}

impl Inner {
    /// Cancel the running task and invalidate its generation.
    fn stop_activity(&mut self) {
        if let Some(activity) = self.activity.take() {
            activity.stop();
        }
        self.generation += 1;
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the state if `generation` is still the live one.
    ///
    /// `f` reports whether it changed anything; subscribers are only woken
    /// when it did. Returns `false` if the task has been superseded.
    pub(crate) fn update<F>(&self, generation: u64, f: F) -> bool
    where
        F: FnOnce(&mut SessionState) -> bool,
    {
        let inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        self.state.send_if_modified(f);
        true
    }

    /// Like [`Shared::update`], but also emits the notification `f` returns.
    pub(crate) fn update_and_notify<F>(&self, generation: u64, f: F) -> bool
    where
        F: FnOnce(&mut SessionState) -> Option<Notification>,
    {
        let inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        let mut notification = None;
        self.state.send_modify(|state| notification = f(state));
        if let Some(n) = notification {
            self.notifier.notify(n);
        }
        true
    }

    /// Hand the session over from the upload to the poller.
    pub(crate) fn begin_processing(&self, generation: u64, job: JobHandle) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        if let Some(activity) = inner.activity.as_mut() {
            activity.kind = ActivityKind::Poll;
        }
        self.state.send_replace(SessionState::Processing {
            job,
            progress: 0,
            error_count: 0,
        });
        true
    }

    /// Called by a task that is about to exit on its own.
    pub(crate) fn finish(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.activity = None;
        }
    }
}
