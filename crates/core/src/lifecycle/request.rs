use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{
    lifecycle::{LifecycleError, ProcessingStep, RequestStatus},
    types::Eta,
};

/// Generation Request entity tracked by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub request_id: String,
    pub status: RequestStatus,
    pub text: String,
    pub start_time: DateTime<Utc>,
    pub progress: u8,
    pub current_step: ProcessingStep,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub estimated_time: Option<Eta>,
    /// Completion polls issued so far
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub watermarked_url: Option<String>,
    #[serde(default)]
    pub paid_video_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,

    #[serde(skip)]
    pub processing_since: Option<Instant>,
}

impl GenerationRequest {
    pub fn new(request_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: RequestStatus::Initializing,
            text: text.into(),
            start_time: Utc::now(),
            progress: 0,
            current_step: ProcessingStep::Preparing,
            queue_position: None,
            estimated_time: None,
            attempts: 0,
            watermarked_url: None,
            paid_video_url: None,
            error: None,
            processing_since: None,
        }
    }

    /// Record for a request first seen through the backend (redirect or lookup),
    /// taking its reported state as-is.
    pub fn from_backend(request_id: impl Into<String>, status: RequestStatus) -> Self {
        let mut request = Self::new(request_id, String::new());
        request.status = status;
        match status {
            RequestStatus::Completed => {
                request.progress = 100;
                request.current_step = ProcessingStep::Completed;
            }
            RequestStatus::Queued => request.current_step = ProcessingStep::Queued,
            RequestStatus::Processing | RequestStatus::Timeout => {
                request.current_step = ProcessingStep::CollectingAssets;
                request.processing_since = Some(Instant::now());
            }
            _ => {}
        }
        request
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status change, rejecting anything the state machine forbids.
    pub fn transition(&mut self, next: RequestStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                request_id: self.request_id.clone(),
                from: self.status,
                to: next,
            });
        }

        match next {
            RequestStatus::Queued => self.current_step = ProcessingStep::Queued,
            RequestStatus::Processing => {
                if self.processing_since.is_none() {
                    self.processing_since = Some(Instant::now());
                }
                self.queue_position = None;
                if matches!(
                    self.current_step,
                    ProcessingStep::Queued | ProcessingStep::Preparing
                ) {
                    self.current_step = ProcessingStep::CollectingAssets;
                }
            }
            RequestStatus::Completed => {
                self.progress = 100;
                self.current_step = ProcessingStep::Completed;
            }
            RequestStatus::Failed => {
                self.progress = 0;
                self.current_step = ProcessingStep::Failed;
            }
            RequestStatus::Cancelling => self.current_step = ProcessingStep::Cancelling,
            RequestStatus::Cancelled => self.current_step = ProcessingStep::Cancelled,
            RequestStatus::Initializing | RequestStatus::Timeout => {}
        }

        self.status = next;
        Ok(())
    }

    /// Raise displayed progress; never moves backwards.
    pub fn advance_progress(&mut self, progress: u8, step: ProcessingStep) {
        if progress > self.progress {
            self.progress = progress.min(100);
            self.current_step = step;
        }
    }

    pub fn elapsed_secs(&self) -> u64 {
        (Utc::now() - self.start_time).num_seconds().max(0) as u64
    }
}
