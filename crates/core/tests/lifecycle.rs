mod common;

use std::time::Duration;

use common::{completed, harness, ok, processing, status, words};
use serde_json::json;
use shortreels_core::{
    ErrorKind, RequestStatus, SessionEvent, ShortreelsError, StateStore, TimerKind, api::Method,
    events::NoticeLevel,
};
use tokio::time::sleep;

fn accepted() -> common::Reply {
    ok(json!({ "status": "processing", "message": "Video generation started" }))
}

#[tokio::test(start_paused = true)]
async fn processing_request_polls_until_completed() {
    let mut h = harness();
    h.transport
        .on(Method::Post, "/generate-video", vec![accepted()]);
    h.transport.on(
        Method::Get,
        "/request-status/",
        vec![processing(), processing(), completed("ignored")],
    );

    let id = h.session.submit(&words(8)).await.unwrap();
    assert_eq!(id.len(), 32);
    assert_eq!(h.session.current_request_id(), Some(id.clone()));
    assert_eq!(
        h.session.request(&id).unwrap().status,
        RequestStatus::Processing
    );

    sleep(Duration::from_secs(7)).await;
    let request = h.session.request(&id).unwrap();
    assert_eq!(request.status, RequestStatus::Completed);
    assert_eq!(request.progress, 100);
    assert_eq!(
        request.watermarked_url.as_deref(),
        Some("http://localhost:8000/api/serve-video/ignored?watermarked=true")
    );
    assert_eq!(h.transport.count(Method::Get, "/request-status/"), 3);
    assert!(!h.session.has_timer(&id, TimerKind::CompletionPoll));
    assert!(!h.session.has_timer(&id, TimerKind::Estimator));

    // nothing polls a finished request
    sleep(Duration::from_secs(30)).await;
    assert_eq!(h.transport.count(Method::Get, "/request-status/"), 3);

    let events = h.view.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::PreviewReady { request_id, .. } if *request_id == id
    )));

    let body = &h.transport.bodies("/generate-video")[0];
    assert_eq!(body["request_id"], id.as_str());
    assert_eq!(body["text"], words(8).as_str());
}

#[tokio::test(start_paused = true)]
async fn visibility_restart_never_duplicates_pollers() {
    let h = harness();
    h.transport
        .on(Method::Post, "/generate-video", vec![accepted()]);
    h.transport
        .on(Method::Get, "/request-status/", vec![processing()]);

    let id = h.session.submit(&words(6)).await.unwrap();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(h.transport.count(Method::Get, "/request-status/"), 2);

    h.session.on_visibility_change(true);
    h.session.on_visibility_change(true);
    sleep(Duration::from_millis(4500)).await;

    // one immediate poll at 5 s, then 7 s and 9 s
    assert_eq!(h.transport.count(Method::Get, "/request-status/"), 5);
    assert!(h.session.has_timer(&id, TimerKind::CompletionPoll));
}

#[tokio::test(start_paused = true)]
async fn backend_failure_reason_is_surfaced() {
    let mut h = harness();
    h.transport
        .on(Method::Post, "/generate-video", vec![accepted()]);
    h.transport.on(
        Method::Get,
        "/request-status/",
        vec![ok(json!({ "status": "failed", "error": "No media found for this text" }))],
    );

    let id = h.session.submit(&words(10)).await.unwrap();
    sleep(Duration::from_secs(3)).await;

    let request = h.session.request(&id).unwrap();
    assert_eq!(request.status, RequestStatus::Failed);
    assert_eq!(request.progress, 0);
    assert_eq!(request.error.as_deref(), Some("No media found for this text"));

    let events = h.view.drain();
    let banner = events.iter().any(|e| matches!(
        e,
        SessionEvent::Banner(n) if n.message == "No media found for this text"
    ));
    let toast = events.iter().any(|e| matches!(
        e,
        SessionEvent::Toast(n) if n.level == NoticeLevel::Error && n.message == "No media found for this text"
    ));
    assert!(banner && toast);
}

#[tokio::test(start_paused = true)]
async fn vanished_request_fails_as_not_found() {
    let h = harness();
    h.transport
        .on(Method::Post, "/generate-video", vec![accepted()]);
    h.transport
        .on(Method::Get, "/request-status/", vec![status(404)]);

    let id = h.session.submit(&words(10)).await.unwrap();
    sleep(Duration::from_secs(3)).await;

    let request = h.session.request(&id).unwrap();
    assert_eq!(request.status, RequestStatus::Failed);
    assert_eq!(
        request.error.as_deref(),
        Some(ErrorKind::NotFound.user_message())
    );
    assert!(!h.session.has_timer(&id, TimerKind::CompletionPoll));
}

#[tokio::test(start_paused = true)]
async fn short_text_never_reaches_the_backend() {
    let mut h = harness();
    let err = h.session.submit("too short").await.unwrap_err();
    assert!(matches!(err, ShortreelsError::Validation { words: 2, .. }));
    assert!(h.transport.calls().is_empty());
    assert!(h.session.current_request_id().is_none());
    assert!(
        h.view
            .drain()
            .iter()
            .any(|e| matches!(e, SessionEvent::Toast(n) if n.kind == Some(ErrorKind::Validation)))
    );
}

#[tokio::test(start_paused = true)]
async fn server_errors_fail_the_submission_after_retries() {
    let h = harness();
    h.transport
        .on(Method::Post, "/generate-video", vec![status(500)]);

    let err = h.session.submit(&words(10)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(h.transport.count(Method::Post, "/generate-video"), 4);

    let id = h.session.current_request_id().unwrap();
    assert_eq!(
        h.session.request(&id).unwrap().status,
        RequestStatus::Failed
    );
    assert!(!h.session.has_timer(&id, TimerKind::Estimator));
}

#[tokio::test(start_paused = true)]
async fn capacity_queues_and_starts_when_a_slot_frees() {
    let mut h = harness();
    h.transport.on(
        Method::Post,
        "/generate-video",
        vec![common::Reply::Json(
            503,
            json!({ "queue_position": 2, "estimated_time": 90 }),
        )],
    );

    let id = h.session.submit(&words(10)).await.unwrap();
    let request = h.session.request(&id).unwrap();
    assert_eq!(request.status, RequestStatus::Queued);
    assert_eq!(request.queue_position, Some(2));
    assert!(!h.session.has_timer(&id, TimerKind::CompletionPoll));
    assert!(h.session.has_timer(&id, TimerKind::QueueWatch));

    let events = h.view.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::Banner(n) if n.level == NoticeLevel::Info
            && n.message == "Your request is in queue (Position: 2). Estimated wait time: 2 minutes"
    )));

    h.transport.on(
        Method::Get,
        "/active-requests",
        vec![ok(json!({
            "active_requests": [
                { "request_id": id, "status": "processing", "progress": 0 }
            ]
        }))],
    );
    h.transport
        .on(Method::Get, "/request-status/", vec![completed(&id)]);

    // queued requests are never polled directly
    sleep(Duration::from_secs(4)).await;
    assert_eq!(h.transport.count(Method::Get, "/request-status/"), 0);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(
        h.session.request(&id).unwrap().status,
        RequestStatus::Completed
    );
    assert_eq!(h.transport.count(Method::Get, "/active-requests"), 1);
    assert!(!h.session.has_timer(&id, TimerKind::QueueWatch));
}

#[tokio::test(start_paused = true)]
async fn queued_request_missing_everywhere_fails() {
    let h = harness();
    h.transport.on(
        Method::Post,
        "/generate-video",
        vec![ok(json!({ "status": "queued", "queue_position": 1, "estimated_time": 30 }))],
    );
    h.transport.on(
        Method::Get,
        "/active-requests",
        vec![ok(json!({ "active_requests": [] }))],
    );
    h.transport
        .on(Method::Get, "/request-status/", vec![status(404)]);

    let id = h.session.submit(&words(10)).await.unwrap();
    sleep(Duration::from_secs(6)).await;

    let request = h.session.request(&id).unwrap();
    assert_eq!(request.status, RequestStatus::Failed);
    assert!(!h.session.has_timer(&id, TimerKind::QueueWatch));
}

#[tokio::test(start_paused = true)]
async fn cancel_confirms_then_resets_the_view() {
    let mut h = harness();
    h.transport
        .on(Method::Post, "/generate-video", vec![accepted()]);
    h.transport
        .on(Method::Get, "/request-status/", vec![processing()]);
    h.transport
        .on(Method::Post, "/cancel-generation", vec![ok(json!({ "status": "cancelled" }))]);

    let id = h.session.submit(&words(10)).await.unwrap();
    sleep(Duration::from_secs(3)).await;
    let polls = h.transport.count(Method::Get, "/request-status/");

    h.session.cancel_current().await.unwrap();
    assert_eq!(
        h.session.request(&id).unwrap().status,
        RequestStatus::Cancelled
    );
    assert!(!h.session.has_timer(&id, TimerKind::CompletionPoll));
    assert!(!h.session.has_timer(&id, TimerKind::Estimator));
    let body = &h.transport.bodies("/cancel-generation")[0];
    assert_eq!(body["request_id"], id.as_str());
    assert!(body.get("immediate").is_none());

    sleep(Duration::from_secs(3)).await;
    assert!(h.session.request(&id).is_none());
    assert!(h.session.current_request_id().is_none());
    assert_eq!(h.transport.count(Method::Get, "/request-status/"), polls);

    let events = h.view.drain();
    assert!(events.iter().any(|e| matches!(e, SessionEvent::Reset)));
}

#[tokio::test(start_paused = true)]
async fn failed_cancel_drops_the_request() {
    let mut h = harness();
    h.transport
        .on(Method::Post, "/generate-video", vec![accepted()]);
    h.transport
        .on(Method::Get, "/request-status/", vec![processing()]);
    h.transport
        .on(Method::Post, "/cancel-generation", vec![status(500)]);

    let id = h.session.submit(&words(10)).await.unwrap();
    assert!(h.session.cancel(&id).await.is_err());
    assert!(h.session.request(&id).is_none());
    assert!(h.session.current_request_id().is_none());

    let events = h.view.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::Toast(n) if n.level == NoticeLevel::Error
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::Banner(n) if n.level == NoticeLevel::Error
    )));
    assert!(events.iter().any(|e| matches!(e, SessionEvent::Reset)));
}

#[tokio::test(start_paused = true)]
async fn slow_processing_is_flagged_but_still_polled() {
    let h = harness();
    h.transport
        .on(Method::Post, "/generate-video", vec![accepted()]);
    h.transport
        .on(Method::Get, "/request-status/", vec![processing()]);

    let id = h.session.submit(&words(10)).await.unwrap();
    sleep(Duration::from_secs(301)).await;
    assert_eq!(
        h.session.request(&id).unwrap().status,
        RequestStatus::Timeout
    );

    h.transport
        .on(Method::Get, "/request-status/", vec![completed(&id)]);
    sleep(Duration::from_secs(3)).await;
    assert_eq!(
        h.session.request(&id).unwrap().status,
        RequestStatus::Completed
    );
}

#[tokio::test(start_paused = true)]
async fn acknowledged_requests_are_forgotten() {
    let h = harness();
    h.transport
        .on(Method::Post, "/generate-video", vec![accepted()]);
    h.transport
        .on(Method::Get, "/request-status/", vec![completed("x")]);

    let id = h.session.submit(&words(10)).await.unwrap();
    assert!(!h.session.acknowledge(&id), "pending requests stay tracked");

    sleep(Duration::from_secs(3)).await;
    assert!(h.session.acknowledge(&id));
    assert!(h.session.request(&id).is_none());
    assert!(h.session.current_request_id().is_none());
}

#[tokio::test(start_paused = true)]
async fn only_unacknowledged_requests_are_saved() {
    let h = harness();
    h.transport
        .on(Method::Post, "/generate-video", vec![accepted()]);
    h.transport
        .on(Method::Get, "/request-status/", vec![completed("x")]);

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(h.session.submit(&words(10)).await.unwrap());
        sleep(Duration::from_secs(3)).await;
    }
    for id in &ids[..2] {
        assert!(h.session.acknowledge(id));
    }
    h.session.dispose().await;

    let saved = StateStore::new(h.dir.path()).load().await;
    assert_eq!(saved.active_requests.len(), 1);
    assert_eq!(saved.active_requests[0].0, ids[2]);

    assert!(h.session.acknowledge(&ids[2]));
    h.session.dispose().await;
    let saved = StateStore::new(h.dir.path()).load().await;
    assert!(saved.active_requests.is_empty());
    assert!(saved.current_request_id.is_none());
}
