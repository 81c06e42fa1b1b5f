use std::fmt;

use serde::{Deserialize, Serialize};

/// Status values as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelling,
    Cancelled,
    NotFound,
    #[serde(other)]
    Unknown,
}

/// The backend reports estimates either as seconds or as preformatted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Eta {
    Seconds(f64),
    Text(String),
}

impl Eta {
    pub fn as_seconds(&self) -> Option<u64> {
        match self {
            Eta::Seconds(s) if *s >= 0.0 => Some(s.round() as u64),
            Eta::Seconds(_) => None,
            Eta::Text(t) => t.trim().trim_end_matches("seconds").trim().parse().ok(),
        }
    }
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_seconds() {
            Some(secs) => f.write_str(&crate::format::format_wait_minutes(secs)),
            None => match self {
                Eta::Text(t) => f.write_str(t),
                Eta::Seconds(_) => f.write_str("unknown"),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateVideoRequest<'a> {
    pub text: &'a str,
    pub request_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateVideoResponse {
    pub status: RemoteStatus,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub estimated_time: Option<Eta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestStatusResponse {
    pub status: RemoteStatus,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub watermarked_url: Option<String>,
    #[serde(default)]
    pub non_watermarked_url: Option<String>,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub estimated_time: Option<Eta>,
}

/// Video Availability Record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoAvailability {
    #[serde(default)]
    pub watermarked_available: bool,
    #[serde(default)]
    pub non_watermarked_available: bool,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub status: Option<RemoteStatus>,
}

impl VideoAvailability {
    pub fn any_available(&self) -> bool {
        self.watermarked_available || self.non_watermarked_available
    }
}

#[derive(Debug, Serialize)]
pub struct CancelRequest<'a> {
    pub request_id: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub immediate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pricing {
    pub price: f64,
    pub currency: String,
    pub formatted_price: String,
    #[serde(default)]
    pub country_code: Option<String>,
}

/// Pricing Snapshot, refetched before every payment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSnapshot {
    pub price: f64,
    pub currency: String,
    pub formatted_price: String,
    pub amount_in_smallest_unit: u64,
}

impl PricingSnapshot {
    pub fn from_pricing(pricing: Pricing) -> Self {
        Self {
            amount_in_smallest_unit: to_smallest_unit(pricing.price),
            price: pricing.price,
            currency: pricing.currency,
            formatted_price: pricing.formatted_price,
        }
    }
}

/// Paise for INR, cents for everything else.
pub fn to_smallest_unit(amount: f64) -> u64 {
    (amount * 100.0).round().max(0.0) as u64
}

#[derive(Debug, Serialize)]
pub struct CreateOrderRequest<'a> {
    pub request_id: &'a str,
    pub amount: u64,
    pub currency: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub razorpay_key: String,
    pub amount: u64,
    pub currency: String,
    #[serde(default)]
    pub formatted_price: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_payment_id: String,
    pub razorpay_order_id: String,
    pub razorpay_signature: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub paid_video_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerStatus {
    pub active_requests: u32,
    pub max_concurrent: u32,
    #[serde(default)]
    pub queue_size: u32,
    pub available_slots: i64,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveRequestEntry {
    pub request_id: String,
    pub status: RemoteStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub duration: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveRequests {
    pub active_requests: Vec<ActiveRequestEntry>,
    #[serde(default)]
    pub total_processing: u32,
    #[serde(default)]
    pub max_concurrent: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Queue information carried by a 503 response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSignal {
    pub queue_position: Option<u32>,
    pub estimated_seconds: Option<u64>,
}

impl QueueSignal {
    /// Accepts either a structured payload (`queue_position`, `estimated_time`)
    /// or a `detail` text such as `"Position: 3, about 120 seconds"`.
    pub fn from_body(body: &str) -> Self {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            let queue_position = value["queue_position"].as_u64().map(|p| p as u32);
            let estimated_seconds = value["estimated_time"].as_f64().map(|s| s.round() as u64);
            if queue_position.is_some() || estimated_seconds.is_some() {
                return Self {
                    queue_position,
                    estimated_seconds,
                };
            }
            if let Some(detail) = value["detail"].as_str() {
                return Self::from_detail(detail);
            }
        }
        Self::from_detail(body)
    }

    fn from_detail(detail: &str) -> Self {
        let queue_position = detail
            .split_once("Position: ")
            .and_then(|(_, rest)| leading_number(rest))
            .map(|p| p as u32);
        let estimated_seconds = detail.find(" seconds").and_then(|end| {
            let head = &detail[..end];
            let start = head
                .rfind(|c: char| !c.is_ascii_digit())
                .map(|i| i + 1)
                .unwrap_or(0);
            head[start..].parse().ok()
        });
        Self {
            queue_position,
            estimated_seconds,
        }
    }
}

fn leading_number(s: &str) -> Option<u64> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_signal_from_detail_text() {
        let body = r#"{"detail": "Server busy. Position: 4, estimated 150 seconds"}"#;
        let signal = QueueSignal::from_body(body);
        assert_eq!(signal.queue_position, Some(4));
        assert_eq!(signal.estimated_seconds, Some(150));
    }

    #[test]
    fn queue_signal_from_structured_payload() {
        let signal = QueueSignal::from_body(r#"{"queue_position": 2, "estimated_time": 59.6}"#);
        assert_eq!(signal.queue_position, Some(2));
        assert_eq!(signal.estimated_seconds, Some(60));
    }

    #[test]
    fn queue_signal_tolerates_garbage() {
        assert_eq!(QueueSignal::from_body("<html>"), QueueSignal::default());
    }

    #[test]
    fn smallest_unit_rounds_floating_point_prices() {
        assert_eq!(to_smallest_unit(0.99), 99);
        assert_eq!(to_smallest_unit(49.0), 4900);
        assert_eq!(to_smallest_unit(0.29), 29);
    }

    #[test]
    fn unknown_remote_status_does_not_fail_decoding() {
        let resp: RequestStatusResponse =
            serde_json::from_str(r#"{"status": "warming_up", "progress": 5}"#).unwrap();
        assert_eq!(resp.status, RemoteStatus::Unknown);
    }
}
