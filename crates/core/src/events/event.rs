use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::ErrorKind,
    lifecycle::{ProcessingStep, RequestStatus},
    types::VideoAvailability,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub kind: Option<ErrorKind>,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            kind: None,
            message: message.into(),
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            kind: Some(kind),
            message: message.into(),
        }
    }
}

/// What the progress area shows for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressView {
    pub request_id: String,
    pub status: RequestStatus,
    pub progress: u8,
    pub step: ProcessingStep,
    pub message: String,
    pub elapsed_secs: u64,
    pub queue_position: Option<u32>,
    pub is_current: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityNotice {
    /// Free preview, kept for 24 hours
    PreviewExpiresSoon,
    /// Paid copy, kept for 7 days
    PaidExpiresSoon,
}

impl AvailabilityNotice {
    pub fn for_record(record: &VideoAvailability) -> Option<Self> {
        if record.is_paid && !record.non_watermarked_available {
            Some(AvailabilityNotice::PaidExpiresSoon)
        } else if !record.is_paid && record.watermarked_available {
            Some(AvailabilityNotice::PreviewExpiresSoon)
        } else {
            None
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AvailabilityNotice::PreviewExpiresSoon => "This preview will expire in 24 hours.",
            AvailabilityNotice::PaidExpiresSoon => "Your paid video will expire in 7 days.",
        }
    }
}

/// Everything the session tells the view layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Progress(ProgressView),
    StatusChanged {
        request_id: String,
        status: RequestStatus,
    },
    PreviewReady {
        request_id: String,
        url: String,
    },
    PaidVideoReady {
        request_id: String,
        url: String,
    },
    Availability {
        request_id: String,
        record: VideoAvailability,
        notice: Option<AvailabilityNotice>,
    },
    VideoUnavailable {
        request_id: String,
    },
    /// Dismissible inline message; stays until replaced or cleared
    Banner(Notice),
    BannerCleared,
    /// Auto-dismissing notification
    Toast(Notice),
    /// The generation view returns to idle
    Reset,
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::Progress(_) => "session.progress",
            SessionEvent::StatusChanged { .. } => "session.status_changed",
            SessionEvent::PreviewReady { .. } => "session.preview_ready",
            SessionEvent::PaidVideoReady { .. } => "session.paid_video_ready",
            SessionEvent::Availability { .. } => "session.availability",
            SessionEvent::VideoUnavailable { .. } => "session.video_unavailable",
            SessionEvent::Banner(_) => "session.banner",
            SessionEvent::BannerCleared => "session.banner_cleared",
            SessionEvent::Toast(_) => "session.toast",
            SessionEvent::Reset => "session.reset",
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            SessionEvent::Progress(view) => Some(&view.request_id),
            SessionEvent::StatusChanged { request_id, .. }
            | SessionEvent::PreviewReady { request_id, .. }
            | SessionEvent::PaidVideoReady { request_id, .. }
            | SessionEvent::Availability { request_id, .. }
            | SessionEvent::VideoUnavailable { request_id } => Some(request_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventHeader {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub header: EventHeader,
    pub event: SessionEvent,
}

impl Envelope {
    pub fn new(event: SessionEvent) -> Self {
        Self {
            header: EventHeader {
                event_id: Uuid::new_v4(),
                timestamp: Utc::now(),
            },
            event,
        }
    }
}
