//! Fixed pacing parameters shared by every run.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tick cadence and nominal length of a progress run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pacing {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_run_duration_ms")]
    pub run_duration_ms: u64,
    #[serde(default = "default_total_segments")]
    pub total_segments: usize,
    /// Ticks that must pass before any pause can trigger.
    #[serde(default = "default_warmup_ticks")]
    pub warmup_ticks: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    30
}
fn default_run_duration_ms() -> u64 {
    3000
}
fn default_total_segments() -> usize {
    8
}
fn default_warmup_ticks() -> u64 {
    5
}
fn default_settle_delay_ms() -> u64 {
    200
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            run_duration_ms: default_run_duration_ms(),
            total_segments: default_total_segments(),
            warmup_ticks: default_warmup_ticks(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl Pacing {
    /// Ticks in a nominal run, ignoring pauses.
    pub fn total_steps(&self) -> u64 {
        (self.run_duration_ms / self.tick_interval_ms.max(1)).max(1)
    }

    /// Progress added by one tick at speed 1.0.
    pub fn base_increment(&self) -> f64 {
        100.0 / self.total_steps() as f64
    }

    /// Speed-table index for a tick, clamped to the last segment.
    pub fn segment_at_step(&self, step: u64) -> usize {
        let last = self.total_segments.saturating_sub(1);
        let raw = step.saturating_mul(self.total_segments as u64) / self.total_steps();
        (raw as usize).min(last)
    }

    /// Segment the progress value sits in. Unclamped: 100% maps to
    /// `total_segments`, one past the last real segment.
    pub fn segment_for_progress(&self, progress: f64) -> usize {
        ((progress / 100.0) * self.total_segments as f64).floor() as usize
    }

    /// Reject pacing that cannot drive a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pacing.tick_interval_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.run_duration_ms < self.tick_interval_ms {
            return Err(ConfigError::InvalidValue {
                key: "pacing.run_duration_ms".into(),
                message: format!("must be at least one tick ({} ms)", self.tick_interval_ms),
            });
        }
        if self.run_duration_ms % self.tick_interval_ms != 0 {
            return Err(ConfigError::InvalidValue {
                key: "pacing.run_duration_ms".into(),
                message: format!(
                    "must be a multiple of the tick interval ({} ms)",
                    self.tick_interval_ms
                ),
            });
        }
        if self.total_segments == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pacing.total_segments".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}
