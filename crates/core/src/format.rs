use crate::lifecycle::{ProcessingStep, RequestStatus};

/// Format seconds as M:SS; zero renders as an empty string
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return String::new();
    }
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Round an estimate up to whole minutes ("1 minute", "3 minutes")
pub fn format_wait_minutes(seconds: u64) -> String {
    let minutes = seconds.div_ceil(60);
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{} minutes", minutes)
    }
}

/// Format a price the way the checkout displays it
pub fn format_price(price: f64, currency: &str) -> String {
    let symbol = match currency {
        "INR" => "₹",
        "GBP" => "£",
        "EUR" => "€",
        _ => "$",
    };
    if currency == "INR" {
        format!("{}{}", symbol, price.trunc() as i64)
    } else {
        format!("{}{:.2}", symbol, price)
    }
}

pub fn queue_message(position: Option<u32>, wait: Option<&str>) -> String {
    let position = position
        .map(|p| p.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "Your request is in queue (Position: {}). Estimated wait time: {}",
        position,
        wait.unwrap_or("unknown")
    )
}

pub fn step_message(step: ProcessingStep) -> &'static str {
    match step {
        ProcessingStep::Preparing => "Preparing your video...",
        ProcessingStep::Queued => "Waiting in queue...",
        ProcessingStep::CollectingAssets => "Gathering content and media...",
        ProcessingStep::OptimizingAudio => "Generating and optimizing audio...",
        ProcessingStep::EnhancingVisuals => "Processing video assets...",
        ProcessingStep::ComposingScene => "Composing your video...",
        ProcessingStep::Polishing => "Adding final touches...",
        ProcessingStep::Completed => "Video ready!",
        ProcessingStep::Failed => "Unable to complete video generation",
        ProcessingStep::Cancelling => "Cancelling your video...",
        ProcessingStep::Cancelled => "Video generation cancelled",
    }
}

pub fn status_message(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Initializing => "Initializing video generation...",
        RequestStatus::Queued => "Waiting in queue...",
        RequestStatus::Processing => "Processing your video...",
        RequestStatus::Completed => "Video ready!",
        RequestStatus::Failed => "Unable to complete video generation",
        RequestStatus::Cancelling => "Cancelling your video...",
        RequestStatus::Cancelled => "Video generation cancelled",
        RequestStatus::Timeout => "Taking longer than expected - still processing...",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(0), "");
        assert_eq!(format_duration(75), "1:15");
        assert_eq!(format_duration(600), "10:00");
    }

    #[test]
    fn wait_is_rounded_up() {
        assert_eq!(format_wait_minutes(30), "1 minute");
        assert_eq!(format_wait_minutes(61), "2 minutes");
    }

    #[test]
    fn prices() {
        assert_eq!(format_price(49.0, "INR"), "₹49");
        assert_eq!(format_price(0.99, "USD"), "$0.99");
        assert_eq!(format_price(0.79, "GBP"), "£0.79");
        assert_eq!(format_price(1.5, "JPY"), "$1.50");
    }

    #[test]
    fn queue_message_with_unknowns() {
        assert_eq!(
            queue_message(None, None),
            "Your request is in queue (Position: unknown). Estimated wait time: unknown"
        );
    }
}
