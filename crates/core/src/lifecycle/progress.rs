use crate::lifecycle::ProcessingStep;

/// Time-driven progress shown while the backend works. It only ever reaches
/// its ceiling; completion comes from the completion poll.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    progress: u8,
    increment: u8,
    ceiling: u8,
}

impl Default for ProgressEstimator {
    fn default() -> Self {
        Self {
            progress: 0,
            increment: 10,
            ceiling: 80,
        }
    }
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_exhausted(&self) -> bool {
        self.progress >= self.ceiling
    }

    /// Advance one step. `None` once the ceiling is reached.
    pub fn tick(&mut self) -> Option<(u8, ProcessingStep)> {
        if self.is_exhausted() {
            return None;
        }
        self.progress = (self.progress + self.increment).min(self.ceiling);
        Some((self.progress, step_for(self.progress)))
    }
}

pub fn step_for(progress: u8) -> ProcessingStep {
    match progress {
        0..=20 => ProcessingStep::CollectingAssets,
        21..=40 => ProcessingStep::OptimizingAudio,
        41..=60 => ProcessingStep::EnhancingVisuals,
        _ => ProcessingStep::ComposingScene,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn climbs_to_eighty_in_eight_steps() {
        let mut estimator = ProgressEstimator::new();
        let ticks: Vec<_> = std::iter::from_fn(|| estimator.tick()).collect();
        assert_eq!(ticks.len(), 8);
        assert_eq!(ticks.first(), Some(&(10, ProcessingStep::CollectingAssets)));
        assert_eq!(ticks[2], (30, ProcessingStep::OptimizingAudio));
        assert_eq!(ticks[5], (60, ProcessingStep::EnhancingVisuals));
        assert_eq!(ticks.last(), Some(&(80, ProcessingStep::ComposingScene)));
        assert!(estimator.is_exhausted());
        assert_eq!(estimator.tick(), None);
    }
}
