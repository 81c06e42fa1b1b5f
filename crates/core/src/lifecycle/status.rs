use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Invalid transition for {request_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        request_id: String,
        from: RequestStatus,
        to: RequestStatus,
    },
}

/// Client-side mirror of a generation request's backend state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Initializing,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelling,
    Cancelled,
    /// Soft state: processing is taking long, polling continues
    Timeout,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Failed | RequestStatus::Cancelled
        )
    }

    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        match self {
            Initializing => matches!(next, Queued | Processing | Failed | Cancelling),
            Queued => matches!(next, Queued | Processing | Failed | Cancelling),
            Processing => matches!(next, Processing | Completed | Failed | Cancelling | Timeout),
            Timeout => matches!(next, Timeout | Processing | Completed | Failed | Cancelling),
            Cancelling => matches!(next, Cancelled | Failed),
            Completed | Failed | Cancelled => false,
        }
    }
}

/// Fine-grained step shown while processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStep {
    Preparing,
    Queued,
    CollectingAssets,
    OptimizingAudio,
    EnhancingVisuals,
    ComposingScene,
    Polishing,
    Completed,
    Failed,
    Cancelling,
    Cancelled,
}

impl ProcessingStep {
    pub fn from_backend(step: &str) -> Option<Self> {
        let step = match step {
            "preparing" | "initializing" => ProcessingStep::Preparing,
            "queued" => ProcessingStep::Queued,
            "collecting_assets" => ProcessingStep::CollectingAssets,
            "optimizing_audio" => ProcessingStep::OptimizingAudio,
            "enhancing_visuals" => ProcessingStep::EnhancingVisuals,
            "composing_scene" => ProcessingStep::ComposingScene,
            "polishing" => ProcessingStep::Polishing,
            "completed" => ProcessingStep::Completed,
            "failed" => ProcessingStep::Failed,
            "cancelling" => ProcessingStep::Cancelling,
            "cancelled" => ProcessingStep::Cancelled,
            _ => return None,
        };
        Some(step)
    }

    /// Index in the four-stage tracker (collect, optimize, enhance, finalize)
    pub fn tracker_stage(self) -> usize {
        match self {
            ProcessingStep::OptimizingAudio => 1,
            ProcessingStep::EnhancingVisuals | ProcessingStep::ComposingScene => 2,
            ProcessingStep::Polishing | ProcessingStep::Completed => 3,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RequestStatus::*;
    use super::*;

    #[test]
    fn terminal_states_are_final() {
        for terminal in [Completed, Failed, Cancelled] {
            for next in [
                Initializing, Queued, Processing, Completed, Failed, Cancelling, Cancelled, Timeout,
            ] {
                assert!(!terminal.can_transition_to(next), "{:?} -> {:?}", terminal, next);
            }
        }
    }

    #[test]
    fn cancellation_path() {
        assert!(Processing.can_transition_to(Cancelling));
        assert!(Queued.can_transition_to(Cancelling));
        assert!(Cancelling.can_transition_to(Cancelled));
        assert!(!Cancelling.can_transition_to(Processing));
        assert!(!Cancelling.can_transition_to(Completed));
    }

    #[test]
    fn timeout_is_soft() {
        assert!(Processing.can_transition_to(Timeout));
        assert!(Timeout.can_transition_to(Completed));
        assert!(Timeout.can_transition_to(Processing));
        assert!(!Queued.can_transition_to(Completed));
    }

    #[test]
    fn backend_steps_map_onto_tracker() {
        assert_eq!(
            ProcessingStep::from_backend("composing_scene").map(ProcessingStep::tracker_stage),
            Some(2)
        );
        assert_eq!(ProcessingStep::from_backend("teleporting"), None);
    }
}
