//! Timing patterns: speed tables and pause plans for a single run.
//!
//! A pattern is chosen once per run by the [`PatternSelector`] and never
//! mutated afterwards. Patterns are validated against the [`Pacing`] before
//! any run can use them.

mod catalog;
mod pacing;
mod selector;

pub use catalog::builtin_catalog;
pub use pacing::Pacing;
pub use selector::PatternSelector;

use serde::{Deserialize, Serialize};

use crate::error::PatternConfigError;

/// Speed multipliers per segment plus the pauses to take along the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingPattern {
    pub name: String,
    /// One multiplier per segment.
    pub speeds: Vec<f64>,
    /// Segment indices to pause at, strictly ascending.
    #[serde(default)]
    pub pause_points: Vec<usize>,
    /// Pause lengths in declaration order, one per pause point.
    #[serde(default)]
    pub pause_durations_ms: Vec<u64>,
}

impl TimingPattern {
    pub fn new(
        name: impl Into<String>,
        speeds: Vec<f64>,
        pause_points: Vec<usize>,
        pause_durations_ms: Vec<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            speeds,
            pause_points,
            pause_durations_ms,
        }
    }

    /// Speed multiplier for a segment, falling back to the last entry when the
    /// index runs past the table.
    pub fn speed_for_segment(&self, index: usize) -> f64 {
        self.speeds
            .get(index)
            .or_else(|| self.speeds.last())
            .copied()
            .unwrap_or(1.0)
    }

    /// Position of `segment` in the pause plan, if it is a pause point.
    pub fn pause_position(&self, segment: usize) -> Option<usize> {
        self.pause_points.iter().position(|&p| p == segment)
    }

    /// Duration of the `nth` pause taken in a run.
    pub fn pause_duration_ms(&self, nth: usize) -> Option<u64> {
        self.pause_durations_ms.get(nth).copied()
    }

    /// Progress after each tick with pauses ignored, stopping at 100 or after
    /// `total_steps` ticks, whichever comes first.
    pub fn curve(&self, pacing: &Pacing) -> Vec<f64> {
        let base = pacing.base_increment();
        let mut progress = 0.0_f64;
        let mut points = Vec::new();
        for step in 1..=pacing.total_steps() {
            let speed = self.speed_for_segment(pacing.segment_at_step(step));
            progress = (progress + base * speed).min(100.0);
            points.push(progress);
            if progress >= 100.0 {
                break;
            }
        }
        points
    }

    /// Tick at which the curve reaches 100, if it does within a nominal run.
    pub fn steps_to_complete(&self, pacing: &Pacing) -> Option<u64> {
        let curve = self.curve(pacing);
        match curve.last() {
            Some(&p) if p >= 100.0 => Some(curve.len() as u64),
            _ => None,
        }
    }

    /// Check the pattern against the pacing it will run under.
    pub fn validate(&self, pacing: &Pacing) -> Result<(), PatternConfigError> {
        if self.speeds.len() != pacing.total_segments {
            return Err(PatternConfigError::SpeedTableLength {
                name: self.name.clone(),
                expected: pacing.total_segments,
                actual: self.speeds.len(),
            });
        }
        if let Some((index, &value)) = self
            .speeds
            .iter()
            .enumerate()
            .find(|(_, s)| !s.is_finite() || **s <= 0.0)
        {
            return Err(PatternConfigError::InvalidSpeed {
                name: self.name.clone(),
                index,
                value,
            });
        }
        if let Some(&segment) = self
            .pause_points
            .iter()
            .find(|&&p| p >= pacing.total_segments)
        {
            return Err(PatternConfigError::PauseOutOfRange {
                name: self.name.clone(),
                segment,
                total_segments: pacing.total_segments,
            });
        }
        if self.pause_points.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PatternConfigError::PauseOrder {
                name: self.name.clone(),
            });
        }
        if self.pause_durations_ms.len() < self.pause_points.len() {
            return Err(PatternConfigError::MissingPauseDurations {
                name: self.name.clone(),
                points: self.pause_points.len(),
                durations: self.pause_durations_ms.len(),
            });
        }
        if let Some(index) = self
            .pause_durations_ms
            .iter()
            .take(self.pause_points.len())
            .position(|&d| d == 0)
        {
            return Err(PatternConfigError::ZeroPauseDuration {
                name: self.name.clone(),
                index,
            });
        }
        if self.steps_to_complete(pacing).is_none() {
            return Err(PatternConfigError::Unreachable {
                name: self.name.clone(),
                reached: self.curve(pacing).last().copied().unwrap_or(0.0),
                total_steps: pacing.total_steps(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform() -> TimingPattern {
        TimingPattern::new("uniform", vec![1.0; 8], vec![4], vec![600])
    }

    #[test]
    fn uniform_pattern_completes_exactly_at_total_steps() {
        let pacing = Pacing::default();
        assert_eq!(uniform().steps_to_complete(&pacing), Some(100));
        assert_eq!(uniform().curve(&pacing).last(), Some(&100.0));
    }

    #[test]
    fn speed_falls_back_to_last_entry() {
        let p = uniform();
        assert_eq!(p.speed_for_segment(42), 1.0);
        let short = TimingPattern::new("short", vec![0.5, 2.0], vec![], vec![]);
        assert_eq!(short.speed_for_segment(5), 2.0);
    }

    #[test]
    fn rejects_missing_pause_durations() {
        let p = TimingPattern::new("bad", vec![1.0; 8], vec![2, 5], vec![300]);
        assert_eq!(
            p.validate(&Pacing::default()),
            Err(PatternConfigError::MissingPauseDurations {
                name: "bad".into(),
                points: 2,
                durations: 1
            })
        );
    }

    #[test]
    fn rejects_malformed_speed_tables() {
        let pacing = Pacing::default();
        let short = TimingPattern::new("short", vec![1.0; 7], vec![], vec![]);
        assert!(matches!(
            short.validate(&pacing),
            Err(PatternConfigError::SpeedTableLength { actual: 7, .. })
        ));

        let mut negative = uniform();
        negative.speeds[3] = -0.5;
        assert!(matches!(
            negative.validate(&pacing),
            Err(PatternConfigError::InvalidSpeed { index: 3, .. })
        ));

        let slow = TimingPattern::new("slow", vec![0.5; 8], vec![], vec![]);
        assert!(matches!(
            slow.validate(&pacing),
            Err(PatternConfigError::Unreachable { .. })
        ));
    }

    #[test]
    fn rejects_bad_pause_plans() {
        let pacing = Pacing::default();
        let out_of_range = TimingPattern::new("oor", vec![1.0; 8], vec![8], vec![100]);
        assert!(matches!(
            out_of_range.validate(&pacing),
            Err(PatternConfigError::PauseOutOfRange { segment: 8, .. })
        ));

        let unordered = TimingPattern::new("order", vec![1.0; 8], vec![5, 2], vec![100, 100]);
        assert!(matches!(
            unordered.validate(&pacing),
            Err(PatternConfigError::PauseOrder { .. })
        ));

        let zero = TimingPattern::new("zero", vec![1.0; 8], vec![2], vec![0]);
        assert!(matches!(
            zero.validate(&pacing),
            Err(PatternConfigError::ZeroPauseDuration { index: 0, .. })
        ));
    }
}
