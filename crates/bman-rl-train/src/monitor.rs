//! Early-stop predicates checked once per training iteration

use bman_rl_core::StepInfo;

/// Decides from the latest per-slot infos whether training should stop
pub trait StopPredicate {
    fn should_stop(&self, infos: &[StepInfo]) -> bool;
}

impl<F> StopPredicate for F
where
    F: Fn(&[StepInfo]) -> bool,
{
    fn should_stop(&self, infos: &[StepInfo]) -> bool {
        self(infos)
    }
}

/// Stops once any slot's cumulative score exceeds the threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreThreshold {
    pub threshold: f64,
}

impl ScoreThreshold {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl StopPredicate for ScoreThreshold {
    fn should_stop(&self, infos: &[StepInfo]) -> bool {
        infos.iter().any(|info| info.score > self.threshold)
    }
}

/// Never stops; training runs the full iteration budget
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StopPredicate for NeverStop {
    fn should_stop(&self, _infos: &[StepInfo]) -> bool {
        false
    }
}
