use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{debug, info, warn};

use crate::{
    error::{ApiError, ShortreelsError},
    events::{AvailabilityNotice, Notice, NoticeLevel, SessionEvent},
    format::status_message,
    lifecycle::{GenerationRequest, LifecycleError, ProcessingStep, ProgressEstimator, RequestStatus, step_for},
    session::{Session, TimerKind},
    types::{RemoteStatus, RequestStatusResponse, VideoAvailability},
};

enum PollOutcome {
    Continue,
    Stop,
    Completed(String),
    Failed(ShortreelsError),
    Cancelled,
}

impl Session {
    pub(super) fn start_completion_poll(&self, request_id: &str, immediate: bool) {
        let period = self.timing().completion_poll;
        let session = self.clone();
        let id = request_id.to_string();
        debug!(request_id, immediate, "starting completion poll");

        self.inner
            .timers
            .spawn(request_id, TimerKind::CompletionPoll, async move {
                let start = if immediate {
                    Instant::now()
                } else {
                    Instant::now() + period
                };
                let mut ticker = interval_at(start, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if !session.poll_once(&id).await {
                        break;
                    }
                }
                debug!(request_id = %id, "completion poll stopped");
            });
    }

    /// One completion poll. `false` once polling should stop.
    async fn poll_once(&self, request_id: &str) -> bool {
        let attempts = self.update(request_id, |r| {
            if matches!(r.status, RequestStatus::Processing | RequestStatus::Timeout) {
                r.attempts += 1;
                Some(r.attempts)
            } else {
                None
            }
        });
        let Some(Some(attempts)) = attempts else {
            return false;
        };
        debug!(request_id, attempts, "polling request status");

        match self.inner.api.request_status(request_id).await {
            Ok(resp) => self.apply_status(request_id, resp, TimerKind::CompletionPoll),
            Err(e @ ApiError::NotFound { .. }) => {
                self.fail_request(request_id, &e.into(), Some(TimerKind::CompletionPoll));
                false
            }
            Err(e) => {
                warn!(request_id, error = %e, "completion poll failed");
                true
            }
        }
    }

    /// Fold a status report into the tracked request. `false` once the
    /// request needs no more polling.
    pub(super) fn apply_status(
        &self,
        request_id: &str,
        resp: RequestStatusResponse,
        own: TimerKind,
    ) -> bool {
        let config = self.inner.api.config();
        let outcome = {
            let mut state = self.state();
            let Some(request) = state.requests.get_mut(request_id) else {
                return false;
            };
            if request.is_terminal() || request.status == RequestStatus::Cancelling {
                return false;
            }

            match resp.status {
                RemoteStatus::Completed => {
                    let url = match resp.watermarked_url.as_deref() {
                        Some(url) => config.resolve(url),
                        None => config.video_url(request_id, true),
                    };
                    match complete(request, url.clone()) {
                        Ok(()) => PollOutcome::Completed(url),
                        Err(e) => {
                            warn!(error = %e, "completion not applied");
                            PollOutcome::Stop
                        }
                    }
                }
                RemoteStatus::Failed => PollOutcome::Failed(ShortreelsError::GenerationFailed {
                    request_id: request_id.to_string(),
                    reason: resp
                        .error
                        .or(resp.message)
                        .unwrap_or_else(|| "Video generation failed".to_string()),
                }),
                RemoteStatus::Processing => {
                    if matches!(
                        request.status,
                        RequestStatus::Initializing | RequestStatus::Queued
                    ) && let Err(e) = request.transition(RequestStatus::Processing)
                    {
                        warn!(error = %e, "processing update not applied");
                    }
                    if let Some(progress) = resp.progress {
                        let progress = progress.clamp(0.0, 99.0) as u8;
                        let step = resp
                            .current_step
                            .as_deref()
                            .and_then(ProcessingStep::from_backend)
                            .unwrap_or_else(|| step_for(progress));
                        request.advance_progress(progress, step);
                    }
                    PollOutcome::Continue
                }
                RemoteStatus::Queued => {
                    if request.status == RequestStatus::Queued {
                        request.queue_position = resp.queue_position.or(request.queue_position);
                        if resp.estimated_time.is_some() {
                            request.estimated_time = resp.estimated_time;
                        }
                    }
                    PollOutcome::Continue
                }
                RemoteStatus::Cancelling | RemoteStatus::Cancelled => {
                    match request
                        .transition(RequestStatus::Cancelling)
                        .and_then(|_| request.transition(RequestStatus::Cancelled))
                    {
                        Ok(()) => PollOutcome::Cancelled,
                        Err(e) => {
                            warn!(error = %e, "cancellation not applied");
                            PollOutcome::Stop
                        }
                    }
                }
                RemoteStatus::NotFound => PollOutcome::Failed(
                    ApiError::NotFound {
                        path: format!("/request-status/{}", request_id),
                    }
                    .into(),
                ),
                RemoteStatus::Unknown => {
                    warn!(request_id, "unrecognised status from backend");
                    PollOutcome::Continue
                }
            }
        };

        match outcome {
            PollOutcome::Continue => {
                self.check_soft_timeout(request_id);
                self.emit_progress(request_id);
                true
            }
            PollOutcome::Stop => false,
            PollOutcome::Completed(url) => {
                info!(request_id, "video ready");
                self.inner.timers.stop_others(request_id, own);
                self.emit(SessionEvent::BannerCleared);
                self.emit_status(request_id);
                self.emit(SessionEvent::PreviewReady {
                    request_id: request_id.to_string(),
                    url,
                });
                self.emit(SessionEvent::Toast(Notice::new(
                    NoticeLevel::Success,
                    "Your video is ready!",
                )));
                false
            }
            PollOutcome::Failed(err) => {
                self.fail_request(request_id, &err, Some(own));
                false
            }
            PollOutcome::Cancelled => {
                info!(request_id, "backend reports request cancelled");
                self.inner.timers.stop_others(request_id, own);
                self.emit_status(request_id);
                false
            }
        }
    }

    /// Flag requests that have been processing for too long. Polling goes on.
    pub(super) fn check_soft_timeout(&self, request_id: &str) {
        let soft_timeout = self.timing().soft_timeout;
        let flagged = self
            .update(request_id, |r| {
                let overdue = r.status == RequestStatus::Processing
                    && r.processing_since.is_some_and(|since| since.elapsed() >= soft_timeout);
                overdue && r.transition(RequestStatus::Timeout).is_ok()
            })
            .unwrap_or(false);
        if flagged {
            warn!(request_id, "request is taking longer than expected");
            self.emit_status(request_id);
            self.emit(SessionEvent::Banner(Notice::new(
                NoticeLevel::Warning,
                status_message(RequestStatus::Timeout),
            )));
        }
    }

    pub(super) fn start_estimator(&self, request_id: &str) {
        let period = self.timing().estimator_step;
        let session = self.clone();
        let id = request_id.to_string();

        self.inner
            .timers
            .spawn(request_id, TimerKind::Estimator, async move {
                let mut estimator = ProgressEstimator::new();
                let mut ticker = interval_at(Instant::now() + period, period);
                loop {
                    ticker.tick().await;
                    let Some((progress, step)) = estimator.tick() else {
                        break;
                    };
                    let advanced = session.update(&id, |r| {
                        if matches!(
                            r.status,
                            RequestStatus::Initializing
                                | RequestStatus::Processing
                                | RequestStatus::Timeout
                        ) {
                            r.advance_progress(progress, step);
                            true
                        } else {
                            false
                        }
                    });
                    if advanced != Some(true) {
                        break;
                    }
                    session.emit_progress(&id);
                }
            });
    }

    /// While queued, watch the backend's active list for the request to start.
    pub(super) fn start_queue_watch(&self, request_id: &str) {
        let period = self.timing().queue_poll;
        let session = self.clone();
        let id = request_id.to_string();

        self.inner
            .timers
            .spawn(request_id, TimerKind::QueueWatch, async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if session.status_of(&id) != Some(RequestStatus::Queued) {
                        break;
                    }
                    if !session.watch_queue_once(&id).await {
                        break;
                    }
                }
            });
    }

    async fn watch_queue_once(&self, request_id: &str) -> bool {
        let active = match self.inner.api.active_requests().await {
            Ok(active) => active,
            Err(e) => {
                warn!(request_id, error = %e, "queue check failed");
                return true;
            }
        };
        if self.status_of(request_id) != Some(RequestStatus::Queued) {
            return false;
        }

        match active
            .active_requests
            .into_iter()
            .find(|entry| entry.request_id == request_id)
        {
            Some(entry) if entry.status == RemoteStatus::Processing => {
                self.enter_processing(request_id, true);
                false
            }
            Some(entry) => {
                let moved = self
                    .update(request_id, |r| {
                        let moved = entry.queue_position.is_some()
                            && entry.queue_position != r.queue_position;
                        if moved {
                            r.queue_position = entry.queue_position;
                        }
                        moved
                    })
                    .unwrap_or(false);
                if moved {
                    debug!(request_id, position = ?entry.queue_position, "queue position changed");
                    self.emit_progress(request_id);
                }
                true
            }
            // Finished work leaves the active list; ask about the request itself.
            None => match self.inner.api.request_status(request_id).await {
                Ok(resp) => {
                    let keep = self.apply_status(request_id, resp, TimerKind::QueueWatch);
                    if keep && self.status_of(request_id) == Some(RequestStatus::Processing) {
                        self.enter_processing(request_id, false);
                        return false;
                    }
                    keep
                }
                Err(e @ ApiError::NotFound { .. }) => {
                    self.fail_request(request_id, &e.into(), Some(TimerKind::QueueWatch));
                    false
                }
                Err(e) => {
                    warn!(request_id, error = %e, "queued request lookup failed");
                    true
                }
            },
        }
    }

    /// Artifact availability, checked every minute. Errors never stop it.
    pub(super) fn start_availability(&self, request_id: &str) {
        let period = self.timing().availability_poll;
        let session = self.clone();
        let id = request_id.to_string();

        self.inner
            .timers
            .spawn(request_id, TimerKind::Availability, async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    match session.inner.api.video_status(&id).await {
                        Ok(record) => {
                            if !session.apply_availability(&id, record) {
                                break;
                            }
                        }
                        Err(e) => warn!(request_id = %id, error = %e, "availability check failed"),
                    }
                }
                debug!(request_id = %id, "availability polling stopped");
            });
    }

    pub(super) fn apply_availability(&self, request_id: &str, record: VideoAvailability) -> bool {
        if record.status == Some(RemoteStatus::Completed) {
            self.state().availability.remove(request_id);
            return false;
        }
        if !record.any_available() {
            self.state().availability.remove(request_id);
            info!(request_id, "video no longer available");
            self.emit(SessionEvent::VideoUnavailable {
                request_id: request_id.to_string(),
            });
            return false;
        }

        let notice = AvailabilityNotice::for_record(&record);
        self.state()
            .availability
            .insert(request_id.to_string(), record.clone());
        self.emit(SessionEvent::Availability {
            request_id: request_id.to_string(),
            record,
            notice,
        });
        true
    }
}

/// Move a request to `completed`, passing through `processing` when the
/// backend finished it before the client saw it start.
pub(super) fn complete(request: &mut GenerationRequest, url: String) -> Result<(), LifecycleError> {
    if matches!(
        request.status,
        RequestStatus::Initializing | RequestStatus::Queued
    ) {
        request.transition(RequestStatus::Processing)?;
    }
    request.transition(RequestStatus::Completed)?;
    request.watermarked_url = Some(url);
    Ok(())
}
