use serde::{Deserialize, Serialize};

use crate::clock::OwnerId;
use crate::gate::{AbortReason, SignalSource};

/// Every state change in a choreography produces an Event.
/// Timestamps are clock milliseconds since the choreographer was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    RunStarted {
        run: OwnerId,
        pattern: String,
        at_ms: u64,
    },
    /// Progress stalled at a pause point.
    RunPaused {
        run: OwnerId,
        segment: usize,
        progress: f64,
        duration_ms: u64,
        at_ms: u64,
    },
    RunResumed {
        run: OwnerId,
        progress: f64,
        at_ms: u64,
    },
    /// Progress hit 100%; the settle delay is now running.
    RunReachedFull {
        run: OwnerId,
        step: u64,
        at_ms: u64,
    },
    /// Settle delay elapsed and the completion callback ran.
    RunCompleted {
        run: OwnerId,
        steps: u64,
        pauses_taken: usize,
        at_ms: u64,
    },
    RunCancelled {
        run: OwnerId,
        progress: f64,
        at_ms: u64,
    },
    GateOpened {
        gate: OwnerId,
        at_ms: u64,
    },
    SignalReported {
        gate: OwnerId,
        source: SignalSource,
        at_ms: u64,
    },
    /// Both signals are in; the transition delay started.
    GateArmed {
        gate: OwnerId,
        delay_ms: u64,
        at_ms: u64,
    },
    GateFired {
        gate: OwnerId,
        at_ms: u64,
    },
    GateAborted {
        gate: OwnerId,
        reason: AbortReason,
        at_ms: u64,
    },
    /// The analysis call failed; the message is meant for the user.
    OperationFailed {
        message: String,
        at_ms: u64,
    },
    /// Downstream transition carrying the untouched analysis result.
    Transition {
        result: serde_json::Value,
        at_ms: u64,
    },
}

impl Event {
    pub fn at_ms(&self) -> u64 {
        match self {
            Event::RunStarted { at_ms, .. }
            | Event::RunPaused { at_ms, .. }
            | Event::RunResumed { at_ms, .. }
            | Event::RunReachedFull { at_ms, .. }
            | Event::RunCompleted { at_ms, .. }
            | Event::RunCancelled { at_ms, .. }
            | Event::GateOpened { at_ms, .. }
            | Event::SignalReported { at_ms, .. }
            | Event::GateArmed { at_ms, .. }
            | Event::GateFired { at_ms, .. }
            | Event::GateAborted { at_ms, .. }
            | Event::OperationFailed { at_ms, .. }
            | Event::Transition { at_ms, .. } => *at_ms,
        }
    }
}
