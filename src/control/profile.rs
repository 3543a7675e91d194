//! Timed motion profiles.
//!
//! A profile is a short list of `(motion, hold)` steps executed in order by
//! the [`MotionWorker`](super::worker::MotionWorker).  The `/activate`
//! profile extends, holds, retracts, holds, then stops.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use super::actuator::Motion;
use crate::config::SystemConfig;

/// Upper bound on steps in one profile.
pub const MAX_STEPS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStep {
    pub motion: Motion,
    /// Time to hold after committing `motion` (milliseconds).
    pub hold_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MotionProfile {
    steps: Vec<ProfileStep, MAX_STEPS>,
}

impl MotionProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.  Returns `false` when the profile is full.
    pub fn push(&mut self, motion: Motion, hold_ms: u32) -> bool {
        self.steps.push(ProfileStep { motion, hold_ms }).is_ok()
    }

    /// Extend, hold, retract, hold, stop.
    pub fn extend_retract(extend_ms: u32, retract_ms: u32) -> Self {
        let mut p = Self::new();
        p.push(Motion::Extend, extend_ms);
        p.push(Motion::Retract, retract_ms);
        p.push(Motion::Stop, 0);
        p
    }

    pub fn from_config(cfg: &SystemConfig) -> Self {
        Self::extend_retract(cfg.profile_extend_ms, cfg.profile_retract_ms)
    }

    pub fn steps(&self) -> &[ProfileStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of all holds.
    pub fn total_ms(&self) -> u64 {
        self.steps.iter().map(|s| u64::from(s.hold_ms)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_ends_stopped() {
        let p = MotionProfile::from_config(&SystemConfig::default());
        let motions: std::vec::Vec<_> = p.steps().iter().map(|s| s.motion).collect();
        assert_eq!(motions, [Motion::Extend, Motion::Retract, Motion::Stop]);
        assert_eq!(p.total_ms(), 6_000);
    }

    #[test]
    fn push_stops_at_capacity() {
        let mut p = MotionProfile::new();
        for _ in 0..MAX_STEPS {
            assert!(p.push(Motion::Stop, 1));
        }
        assert!(!p.push(Motion::Stop, 1));
        assert_eq!(p.len(), MAX_STEPS);
    }
}
