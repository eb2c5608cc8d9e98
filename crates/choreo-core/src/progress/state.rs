use serde::{Deserialize, Serialize};

/// Lifecycle phase of a progress run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Idle,
    Running,
    Paused,
    /// Reached 100%. The completion callback runs once the settle delay elapses.
    Completed,
    Cancelled,
}

/// Mutable per-run progress. Only scheduler ticks change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    /// 0.0 ..= 100.0, never decreases.
    pub progress: f64,
    /// Displayed segment, always a valid segment index.
    pub segment: usize,
    pub paused: bool,
    /// Position of the next pause point that may still trigger.
    pub pause_cursor: usize,
    pub step: u64,
    /// Set while a pause is in effect.
    pub looking_ahead: bool,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            progress: 0.0,
            segment: 0,
            paused: false,
            pause_cursor: 0,
            step: 0,
            looking_ahead: false,
        }
    }
}

/// Read-only snapshot for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressView {
    pub phase: RunPhase,
    pub progress: f64,
    pub segment: usize,
    pub total_segments: usize,
    pub paused: bool,
    pub looking_ahead: bool,
    pub pattern: String,
}
