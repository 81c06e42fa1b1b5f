mod checkout;
mod polling;
mod restore;
pub mod timers;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use chrono::Utc;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    api::ApiClient,
    config::TimingConfig,
    error::{ApiError, ErrorKind, Result, ShortreelsError},
    events::{Notice, NoticeLevel, ProgressView, SessionEvent, ViewSender},
    format::{queue_message, status_message, step_message},
    lifecycle::{GenerationRequest, RequestStatus},
    store::{PersistedState, StateStore},
    types::{Eta, GenerateVideoResponse, PricingSnapshot, RemoteStatus, VideoAvailability},
    validation::validate_text,
};

pub use timers::TimerKind;
use timers::TimerRegistry;

/// Owns every tracked generation request, its timers and the persisted
/// state, and reports to the view layer through a [`ViewSender`].
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    api: ApiClient,
    view: ViewSender,
    store: StateStore,
    timers: Arc<TimerRegistry>,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    requests: HashMap<String, GenerationRequest>,
    /// Request bound to the visible generation view
    current: Option<String>,
    availability: HashMap<String, VideoAvailability>,
    pricing: Option<PricingSnapshot>,
}

impl Session {
    pub fn new(api: ApiClient, view: ViewSender) -> Self {
        let store = StateStore::new(&api.config().state_dir);
        Self {
            inner: Arc::new(SessionInner {
                api,
                view,
                store,
                timers: TimerRegistry::new(),
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    fn timing(&self) -> &TimingConfig {
        &self.inner.api.config().timing
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().expect("Session state poisoned")
    }

    fn emit(&self, event: SessionEvent) {
        self.inner.view.emit(event);
    }

    fn weak(&self) -> Weak<SessionInner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<SessionInner>) -> Option<Session> {
        weak.upgrade().map(|inner| Session { inner })
    }

    /// Start the periodic persistence and view refresh tasks.
    pub fn start(&self) {
        let persist_every = self.timing().persist;
        let weak = self.weak();
        self.inner.timers.spawn_global(async move {
            let mut ticker = interval_at(Instant::now() + persist_every, persist_every);
            loop {
                ticker.tick().await;
                let Some(session) = Session::upgrade(&weak) else {
                    break;
                };
                session.persist().await;
            }
        });

        let refresh_every = self.timing().view_refresh;
        let weak = self.weak();
        self.inner.timers.spawn_global(async move {
            let mut ticker = interval_at(Instant::now() + refresh_every, refresh_every);
            loop {
                ticker.tick().await;
                let Some(session) = Session::upgrade(&weak) else {
                    break;
                };
                session.refresh_view();
            }
        });
        debug!("session started");
    }

    /// Stop every timer and write the final state.
    pub async fn dispose(&self) {
        self.inner.timers.abort_all();
        self.persist().await;
        debug!("session disposed");
    }

    pub async fn submit(&self, text: &str) -> Result<String> {
        let text = match validate_text(text) {
            Ok(text) => text,
            Err(e) => {
                self.surface_error(&e);
                return Err(e);
            }
        };

        let request_id = Uuid::new_v4().simple().to_string();
        {
            let mut state = self.state();
            state
                .requests
                .insert(request_id.clone(), GenerationRequest::new(&request_id, text));
            state.current = Some(request_id.clone());
        }
        info!(request_id = %request_id, words = text.split_whitespace().count(), "submitting generation request");
        self.emit(SessionEvent::BannerCleared);
        self.emit_status(&request_id);
        self.start_estimator(&request_id);

        match self.inner.api.generate_video(text, &request_id).await {
            Ok(resp) => self.on_generate_response(&request_id, resp),
            Err(ApiError::Capacity { queue }) => {
                info!(request_id = %request_id, position = ?queue.queue_position, "server at capacity, request queued");
                let eta = queue.estimated_seconds.map(|s| Eta::Seconds(s as f64));
                self.enter_queue(&request_id, queue.queue_position, eta);
                Ok(request_id)
            }
            Err(e) => {
                let err = ShortreelsError::from(e);
                self.fail_request(&request_id, &err, None);
                Err(err)
            }
        }
    }

    fn on_generate_response(&self, request_id: &str, resp: GenerateVideoResponse) -> Result<String> {
        if let Some(server_id) = resp.request_id.as_deref().filter(|id| *id != request_id) {
            warn!(request_id, server_id, "backend echoed a different request id");
        }
        match resp.status {
            RemoteStatus::Queued => {
                self.enter_queue(request_id, resp.queue_position, resp.estimated_time);
                Ok(request_id.to_string())
            }
            RemoteStatus::Processing => {
                self.enter_processing(request_id, false);
                Ok(request_id.to_string())
            }
            other => {
                let err = ShortreelsError::InvalidResponse {
                    reason: format!("unexpected generation status {:?}", other),
                };
                self.fail_request(request_id, &err, None);
                Err(err)
            }
        }
    }

    /// Optimistically enter `cancelling`, then confirm with the backend.
    pub async fn cancel(&self, request_id: &str) -> Result<()> {
        {
            let mut state = self.state();
            let request = state.requests.get_mut(request_id).ok_or_else(|| {
                ShortreelsError::UnknownRequest {
                    request_id: request_id.to_string(),
                }
            })?;
            if request.status == RequestStatus::Cancelling {
                return Ok(());
            }
            request.transition(RequestStatus::Cancelling)?;
        }
        self.inner.timers.stop_all(request_id);
        info!(request_id, "cancelling generation");
        self.emit_status(request_id);

        match self.inner.api.cancel_generation(request_id, false).await {
            Ok(()) => {
                let confirmed = self
                    .update(request_id, |r| r.transition(RequestStatus::Cancelled))
                    .transpose()?
                    .is_some();
                if confirmed {
                    self.emit_status(request_id);
                    self.emit(SessionEvent::Toast(Notice::new(
                        NoticeLevel::Info,
                        ErrorKind::Cancelled.user_message(),
                    )));
                    self.schedule_view_reset(request_id);
                }
                Ok(())
            }
            Err(e) => {
                let err = ShortreelsError::from(e);
                warn!(request_id, error = %err, "cancel request failed");
                self.surface_error(&err);
                self.drop_request(request_id);
                Err(err)
            }
        }
    }

    pub async fn cancel_current(&self) -> Result<()> {
        let current = self
            .current_request_id()
            .ok_or(ShortreelsError::NoActiveRequest)?;
        self.cancel(&current).await
    }

    fn schedule_view_reset(&self, request_id: &str) {
        let delay = self.timing().cancel_reset_delay;
        let session = self.clone();
        let id = request_id.to_string();
        self.inner
            .timers
            .spawn(request_id, TimerKind::ViewReset, async move {
                tokio::time::sleep(delay).await;
                session.acknowledge(&id);
            });
    }

    /// The view has shown the terminal state; forget the request.
    pub fn acknowledge(&self, request_id: &str) -> bool {
        let reset = {
            let mut state = self.state();
            if !state
                .requests
                .get(request_id)
                .is_some_and(GenerationRequest::is_terminal)
            {
                return false;
            }
            state.requests.remove(request_id);
            let was_current = state.current.as_deref() == Some(request_id);
            if was_current {
                state.current = None;
            }
            was_current
        };
        debug!(request_id, "request acknowledged");
        if reset {
            self.emit(SessionEvent::Reset);
        }
        true
    }

    fn drop_request(&self, request_id: &str) {
        self.inner.timers.stop_all(request_id);
        let was_current = {
            let mut state = self.state();
            state.requests.remove(request_id);
            let was_current = state.current.as_deref() == Some(request_id);
            if was_current {
                state.current = None;
            }
            was_current
        };
        if was_current {
            self.emit(SessionEvent::Reset);
        }
    }

    /// Returning to the foreground polls every processing request right away.
    pub fn on_visibility_change(&self, visible: bool) {
        if !visible {
            return;
        }
        let ids = self.inner.timers.ids(TimerKind::CompletionPoll);
        debug!(count = ids.len(), "visible again, restarting completion polls");
        for id in ids {
            self.start_completion_poll(&id, true);
        }
    }

    /// Drop everything: cancel pending work immediately and clear saved state.
    pub async fn reset(&self) -> Result<()> {
        let pending: Vec<String> = {
            let state = self.state();
            state
                .requests
                .values()
                .filter(|r| !r.is_terminal())
                .map(|r| r.request_id.clone())
                .collect()
        };
        let tracked: Vec<String> = self.state().requests.keys().cloned().collect();
        for id in &tracked {
            self.inner.timers.stop_all(id);
        }
        for id in &pending {
            if let Err(e) = self.inner.api.cancel_generation(id, true).await {
                warn!(request_id = %id, error = %e, "immediate cancel failed during reset");
            }
        }
        let availability: Vec<String> = {
            let mut state = self.state();
            let ids = state.availability.keys().cloned().collect();
            *state = SessionState::default();
            ids
        };
        for id in &availability {
            self.inner.timers.stop_all(id);
        }
        self.inner.store.clear().await?;
        info!(cancelled = pending.len(), "session reset");
        self.emit(SessionEvent::Reset);
        Ok(())
    }

    pub async fn persist(&self) {
        let snapshot = self.snapshot();
        if let Err(e) = self.inner.store.save(&snapshot).await {
            warn!(error = %e, "failed to persist session state");
        }
    }

    pub fn snapshot(&self) -> PersistedState {
        let state = self.state();
        let mut active_requests: Vec<(String, GenerationRequest)> = state
            .requests
            .iter()
            .map(|(id, r)| (id.clone(), r.clone()))
            .collect();
        active_requests.sort_by_key(|(_, r)| r.start_time);
        let mut video_availability: Vec<(String, VideoAvailability)> = state
            .availability
            .iter()
            .map(|(id, a)| (id.clone(), a.clone()))
            .collect();
        video_availability.sort_by(|a, b| a.0.cmp(&b.0));

        PersistedState {
            current_request_id: state.current.clone(),
            active_requests,
            video_availability,
            last_updated: Utc::now().timestamp_millis(),
        }
    }

    pub fn request(&self, request_id: &str) -> Option<GenerationRequest> {
        self.state().requests.get(request_id).cloned()
    }

    pub fn current_request_id(&self) -> Option<String> {
        self.state().current.clone()
    }

    pub fn availability(&self, request_id: &str) -> Option<VideoAvailability> {
        self.state().availability.get(request_id).cloned()
    }

    pub fn has_timer(&self, request_id: &str, kind: TimerKind) -> bool {
        self.inner.timers.is_active(request_id, kind)
    }

    /// Progress of every tracked request, oldest first.
    pub fn active_summaries(&self) -> Vec<ProgressView> {
        let state = self.state();
        let mut requests: Vec<&GenerationRequest> = state.requests.values().collect();
        requests.sort_by_key(|r| r.start_time);
        requests
            .into_iter()
            .map(|r| progress_view(&state, r))
            .collect()
    }

    fn refresh_view(&self) {
        let pending: Vec<String> = self
            .state()
            .requests
            .values()
            .filter(|r| !r.is_terminal())
            .map(|r| r.request_id.clone())
            .collect();
        for id in pending {
            self.check_soft_timeout(&id);
            self.emit_progress(&id);
        }
    }

    /// Mutate a tracked request; `None` when it no longer exists.
    fn update<R>(&self, request_id: &str, f: impl FnOnce(&mut GenerationRequest) -> R) -> Option<R> {
        self.state().requests.get_mut(request_id).map(f)
    }

    fn status_of(&self, request_id: &str) -> Option<RequestStatus> {
        self.state().requests.get(request_id).map(|r| r.status)
    }

    fn emit_progress(&self, request_id: &str) {
        let view = {
            let state = self.state();
            state
                .requests
                .get(request_id)
                .map(|r| progress_view(&state, r))
        };
        if let Some(view) = view {
            self.emit(SessionEvent::Progress(view));
        }
    }

    fn emit_status(&self, request_id: &str) {
        if let Some(status) = self.status_of(request_id) {
            self.emit(SessionEvent::StatusChanged {
                request_id: request_id.to_string(),
                status,
            });
            self.emit_progress(request_id);
        }
    }

    /// Errors go out as both a banner and a toast.
    fn surface_error(&self, err: &ShortreelsError) {
        let notice = Notice::error(err.kind(), err.user_message());
        self.emit(SessionEvent::Banner(notice.clone()));
        self.emit(SessionEvent::Toast(notice));
    }

    /// Mark a request failed and stop its timers, sparing `own` when the
    /// caller is one of them.
    fn fail_request(&self, request_id: &str, err: &ShortreelsError, own: Option<TimerKind>) {
        let message = err.user_message();
        let failed = self
            .update(request_id, |r| {
                if r.is_terminal() {
                    return false;
                }
                match r.transition(RequestStatus::Failed) {
                    Ok(()) => {
                        r.error = Some(message.clone());
                        true
                    }
                    Err(e) => {
                        warn!(error = %e, "failure not applied");
                        false
                    }
                }
            })
            .unwrap_or(false);

        match own {
            Some(kind) => self.inner.timers.stop_others(request_id, kind),
            None => self.inner.timers.stop_all(request_id),
        }
        if failed {
            error!(request_id, kind = err.kind().code(), error = %err, "generation failed");
            self.emit_status(request_id);
            self.surface_error(err);
        }
    }

    fn enter_queue(&self, request_id: &str, position: Option<u32>, eta: Option<Eta>) {
        let message = {
            let mut state = self.state();
            let Some(request) = state.requests.get_mut(request_id) else {
                return;
            };
            if let Err(e) = request.transition(RequestStatus::Queued) {
                warn!(error = %e, "queue update not applied");
                return;
            }
            request.queue_position = position;
            request.estimated_time = eta;
            queue_message(
                request.queue_position,
                request.estimated_time.as_ref().map(|e| e.to_string()).as_deref(),
            )
        };
        self.inner.timers.stop(request_id, TimerKind::Estimator);
        self.emit_status(request_id);
        self.emit(SessionEvent::Banner(Notice::new(NoticeLevel::Info, message)));
        self.start_queue_watch(request_id);
    }

    fn enter_processing(&self, request_id: &str, immediate: bool) {
        let was_queued = {
            let mut state = self.state();
            let Some(request) = state.requests.get_mut(request_id) else {
                return;
            };
            let was_queued = request.status == RequestStatus::Queued;
            if let Err(e) = request.transition(RequestStatus::Processing) {
                warn!(error = %e, "processing update not applied");
                return;
            }
            was_queued
        };
        info!(request_id, "request processing");
        // The queue watcher exits on its own once the status moves on.
        if was_queued {
            self.emit(SessionEvent::BannerCleared);
        }
        self.emit_status(request_id);
        self.start_completion_poll(request_id, immediate);
        if !self.inner.timers.is_active(request_id, TimerKind::Estimator) {
            self.start_estimator(request_id);
        }
    }
}

fn progress_view(state: &SessionState, request: &GenerationRequest) -> ProgressView {
    let message = match request.status {
        RequestStatus::Queued => queue_message(
            request.queue_position,
            request.estimated_time.as_ref().map(|e| e.to_string()).as_deref(),
        ),
        RequestStatus::Processing => step_message(request.current_step).to_string(),
        status => status_message(status).to_string(),
    };
    ProgressView {
        request_id: request.request_id.clone(),
        status: request.status,
        progress: request.progress,
        step: request.current_step,
        message,
        elapsed_secs: request.elapsed_secs(),
        queue_position: request.queue_position,
        is_current: state.current.as_deref() == Some(request.request_id.as_str()),
    }
}
