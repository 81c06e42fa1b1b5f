use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::{ApiError, Result, ShortreelsError},
    events::SessionEvent,
    lifecycle::{GenerationRequest, RequestStatus},
    resume::{RedirectParams, strip_query},
    session::{Session, TimerKind, polling::complete},
    types::{RemoteStatus, VideoAvailability},
};

impl Session {
    /// Load the saved state and pick up every request that was not finished.
    /// Returns the ids being tracked again.
    pub async fn resume(&self) -> Vec<String> {
        let saved = self.inner.store.load().await;
        if saved.is_empty() {
            return Vec::new();
        }

        let pending: Vec<(String, RequestStatus)> = {
            let mut state = self.state();
            for (id, mut request) in saved.active_requests {
                if matches!(
                    request.status,
                    RequestStatus::Processing | RequestStatus::Timeout
                ) {
                    request.processing_since = Some(Instant::now());
                }
                state.requests.entry(id).or_insert(request);
            }
            for (id, record) in saved.video_availability {
                state.availability.entry(id).or_insert(record);
            }
            let current = saved
                .current_request_id
                .filter(|id| state.requests.contains_key(id));
            state.current = current;

            let mut pending: Vec<&GenerationRequest> = state
                .requests
                .values()
                .filter(|r| !r.is_terminal())
                .collect();
            pending.sort_by_key(|r| r.start_time);
            pending
                .into_iter()
                .map(|r| (r.request_id.clone(), r.status))
                .collect()
        };
        info!(pending = pending.len(), "resuming saved requests");

        let mut resumed = Vec::with_capacity(pending.len());
        for (id, status) in pending {
            if status == RequestStatus::Cancelling {
                self.settle_cancellation(&id).await;
                continue;
            }
            match self.inner.api.video_status(&id).await {
                Ok(record) if record.any_available() => self.restore_artifact(&id, record),
                Ok(_) => self.resume_tracking(&id, status).await,
                Err(e) => {
                    warn!(request_id = %id, error = %e, "availability lookup failed, resuming polling");
                    self.resume_tracking(&id, status).await;
                }
            }
            resumed.push(id);
        }
        resumed
    }

    /// The cancel was cut short by the restart. Send it again and forget the
    /// request either way.
    async fn settle_cancellation(&self, request_id: &str) {
        match self.inner.api.cancel_generation(request_id, false).await {
            Ok(()) => info!(request_id, "interrupted cancel confirmed"),
            Err(e) => warn!(request_id, error = %e, "interrupted cancel not confirmed"),
        }
        self.drop_request(request_id);
    }

    /// The submit was cut short before the backend answered. Ask the backend
    /// what became of it; anything unresolvable fails.
    async fn settle_submission(&self, request_id: &str) {
        let resp = match self.inner.api.lookup_request(request_id).await {
            Ok(resp) => resp,
            Err(e) => {
                self.fail_request(request_id, &e.into(), None);
                return;
            }
        };
        debug!(request_id, status = ?resp.status, "interrupted submission found");

        if resp.status == RemoteStatus::Queued {
            self.enter_queue(request_id, resp.queue_position, resp.estimated_time);
            return;
        }
        if !self.apply_status(request_id, resp, TimerKind::CompletionPoll) {
            return;
        }
        match self.status_of(request_id) {
            Some(RequestStatus::Processing | RequestStatus::Timeout) => {
                self.emit_status(request_id);
                self.start_completion_poll(request_id, false);
                self.start_estimator(request_id);
            }
            Some(_) => {
                let err = ShortreelsError::InvalidResponse {
                    reason: "interrupted submission has no usable status".to_string(),
                };
                self.fail_request(request_id, &err, None);
            }
            None => {}
        }
    }

    /// Show an artifact that already exists instead of generating again.
    fn restore_artifact(&self, request_id: &str, record: VideoAvailability) {
        let config = self.inner.api.config();
        let paid = record.is_paid && record.non_watermarked_available;
        let preview_url = config.video_url(request_id, true);
        let paid_url = paid.then(|| config.video_url(request_id, false));
        {
            let mut state = self.state();
            if let Some(request) = state.requests.get_mut(request_id) {
                if let Err(e) = complete(request, preview_url.clone()) {
                    warn!(error = %e, "restored completion not applied");
                }
                request.paid_video_url = paid_url.clone();
            }
            state
                .availability
                .insert(request_id.to_string(), record);
        }
        info!(request_id, paid, "restored finished video");

        self.emit_status(request_id);
        match paid_url {
            Some(url) => self.emit(SessionEvent::PaidVideoReady {
                request_id: request_id.to_string(),
                url,
            }),
            None => self.emit(SessionEvent::PreviewReady {
                request_id: request_id.to_string(),
                url: preview_url,
            }),
        }
        self.start_availability(request_id);
    }

    async fn resume_tracking(&self, request_id: &str, status: RequestStatus) {
        debug!(request_id, ?status, "resuming tracking");
        match status {
            RequestStatus::Queued => self.start_queue_watch(request_id),
            RequestStatus::Processing | RequestStatus::Timeout => {
                self.start_completion_poll(request_id, true);
                self.start_estimator(request_id);
            }
            RequestStatus::Initializing => {
                self.settle_submission(request_id).await;
                return;
            }
            _ => return,
        }
        self.emit_status(request_id);
    }

    /// Handle a landing URL. Payment parameters run verification, a bare
    /// `request_id` looks the request up. Returns the URL without its query.
    pub async fn resume_from_redirect(&self, landing: &Url) -> Result<Url> {
        let clean = strip_query(landing);
        let Some(params) = RedirectParams::parse(landing) else {
            return Ok(clean);
        };

        match params.payment {
            Some(receipt) => {
                info!(request_id = %params.request_id, "verifying payment from redirect");
                self.verify(&receipt, &params.request_id).await?;
            }
            None => {
                self.check_existing(&params.request_id).await?;
            }
        }
        Ok(clean)
    }

    /// Look up a request the backend already knows and track it from there.
    pub async fn check_existing(&self, request_id: &str) -> Result<RequestStatus> {
        let resp = match self.inner.api.lookup_request(request_id).await {
            Ok(resp) => resp,
            Err(e) => {
                let err = ShortreelsError::from(e);
                self.surface_error(&err);
                return Err(err);
            }
        };

        let initial = match resp.status {
            RemoteStatus::Completed | RemoteStatus::Processing => RequestStatus::Processing,
            RemoteStatus::Queued => RequestStatus::Queued,
            RemoteStatus::Failed => {
                let err = ShortreelsError::GenerationFailed {
                    request_id: request_id.to_string(),
                    reason: resp
                        .error
                        .unwrap_or_else(|| "Video generation failed".to_string()),
                };
                self.surface_error(&err);
                return Err(err);
            }
            _ => {
                let err: ShortreelsError = ApiError::NotFound {
                    path: format!("/request-status/{}", request_id),
                }
                .into();
                self.surface_error(&err);
                return Err(err);
            }
        };

        {
            let mut state = self.state();
            let request = state
                .requests
                .entry(request_id.to_string())
                .or_insert_with(|| GenerationRequest::from_backend(request_id, initial));
            if initial == RequestStatus::Queued {
                request.queue_position = resp.queue_position;
                request.estimated_time = resp.estimated_time.clone();
            }
            state.current = Some(request_id.to_string());
        }

        match initial {
            RequestStatus::Queued => {
                self.emit_status(request_id);
                self.start_queue_watch(request_id);
            }
            _ => {
                if self.apply_status(request_id, resp, TimerKind::CompletionPoll) {
                    self.start_completion_poll(request_id, false);
                    self.start_estimator(request_id);
                }
            }
        }
        Ok(self.status_of(request_id).unwrap_or(initial))
    }
}
