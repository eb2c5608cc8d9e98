//! Completion gate - two-slot rendezvous for the downstream transition
//!
//! A gate waits for two independent signals: the analysis operation's result
//! and the animation's completion. Once both are in, it starts a short fixed
//! delay and then releases the operation's payload exactly once.
//!
//! ## States
//!
//! ```text
//! Idle -> WaitingBoth -> Fired
//!              |
//!              +-> Aborted   (operation failure or teardown)
//! ```
//!
//! `Fired` and `Aborted` are terminal. Report order does not matter: the
//! delay is armed by whichever report completes the pair, and only once.

use serde::{Deserialize, Serialize};

use crate::clock::{OwnerId, TimerFired, TimerId, TimerKind, TimerService};
use crate::error::OperationError;

/// Gate lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// No gate exists yet
    Idle,
    /// Constructed; at least one slot still empty
    WaitingBoth,
    /// Transition released
    Fired,
    /// Transition can never fire
    Aborted,
}

/// Which side a report comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    Operation,
    Animation,
}

/// Why a gate was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    OperationFailed,
    TornDown,
}

/// One report into the gate
#[derive(Debug, Clone, PartialEq)]
pub enum Signal<P> {
    /// The operation finished, successfully or not
    Operation(Result<P, OperationError>),
    /// The animation reached its end
    Animation,
}

impl<P> Signal<P> {
    pub fn source(&self) -> SignalSource {
        match self {
            Signal::Operation(_) => SignalSource::Operation,
            Signal::Animation => SignalSource::Animation,
        }
    }
}

/// What a report did to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Slot filled; still waiting for the other side
    Recorded,
    /// Both slots filled; transition delay started
    Armed,
    /// Operation failed; the gate is now aborted
    Aborted,
    /// Gate is terminal or the slot was already filled
    Ignored,
}

/// Joins the operation and animation signals and fires once.
#[derive(Debug)]
pub struct CompletionGate<P> {
    id: OwnerId,
    state: GateState,
    payload: Option<P>,
    operation_done: bool,
    animation_done: bool,
    delay_ms: u64,
    delay_timer: Option<TimerId>,
    abort_reason: Option<AbortReason>,
}

impl<P> CompletionGate<P> {
    /// Create a gate that waits `delay_ms` after both signals before firing.
    pub fn new(delay_ms: u64) -> Self {
        Self {
            id: OwnerId::new(),
            state: GateState::WaitingBoth,
            payload: None,
            operation_done: false,
            animation_done: false,
            delay_ms,
            delay_timer: None,
            abort_reason: None,
        }
    }

    pub fn id(&self) -> OwnerId {
        self.id
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn operation_done(&self) -> bool {
        self.operation_done
    }

    pub fn animation_done(&self) -> bool {
        self.animation_done
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.abort_reason
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, GateState::Fired | GateState::Aborted)
    }

    /// Feed one signal into the gate.
    pub fn report(&mut self, signal: Signal<P>, clock: &mut impl TimerService) -> ReportOutcome {
        if self.state != GateState::WaitingBoth {
            tracing::debug!(
                gate = %self.id,
                source = ?signal.source(),
                state = ?self.state,
                "report after gate closed"
            );
            return ReportOutcome::Ignored;
        }

        match signal {
            Signal::Operation(_) if self.operation_done => {
                tracing::warn!(gate = %self.id, "duplicate operation report ignored");
                return ReportOutcome::Ignored;
            }
            Signal::Operation(Err(err)) => {
                tracing::warn!(gate = %self.id, error = %err, "operation failed; gate aborted");
                self.abort(AbortReason::OperationFailed, clock);
                return ReportOutcome::Aborted;
            }
            Signal::Operation(Ok(payload)) => {
                self.payload = Some(payload);
                self.operation_done = true;
            }
            Signal::Animation if self.animation_done => {
                tracing::warn!(gate = %self.id, "duplicate animation report ignored");
                return ReportOutcome::Ignored;
            }
            Signal::Animation => {
                self.animation_done = true;
            }
        }

        if self.operation_done && self.animation_done && self.delay_timer.is_none() {
            self.delay_timer =
                Some(clock.start_once(self.id, TimerKind::TransitionDelay, self.delay_ms));
            tracing::debug!(gate = %self.id, delay_ms = self.delay_ms, "gate armed");
            ReportOutcome::Armed
        } else {
            ReportOutcome::Recorded
        }
    }

    /// Handle an elapsed timer. Returns the payload when this call fires the
    /// gate; every later call returns `None`.
    pub fn handle_timer(&mut self, fired: &TimerFired) -> Option<P> {
        if fired.owner != self.id
            || fired.kind != TimerKind::TransitionDelay
            || self.state != GateState::WaitingBoth
            || self.delay_timer != Some(fired.id)
        {
            return None;
        }
        self.delay_timer = None;
        self.state = GateState::Fired;
        tracing::info!(gate = %self.id, at_ms = fired.at_ms, "gate fired");
        self.payload.take()
    }

    /// Tear the gate down before it fires. Cancels a pending delay; all later
    /// reports are ignored. Returns `false` if the gate was already terminal.
    pub fn teardown(&mut self, clock: &mut impl TimerService) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.abort(AbortReason::TornDown, clock);
        true
    }

    fn abort(&mut self, reason: AbortReason, clock: &mut impl TimerService) {
        if let Some(id) = self.delay_timer.take() {
            clock.cancel(id);
        }
        clock.cancel_owner(self.id);
        self.payload = None;
        self.state = GateState::Aborted;
        self.abort_reason = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn drain(
        gate: &mut CompletionGate<Value>,
        clock: &mut VirtualClock,
        until: u64,
    ) -> Vec<(u64, Value)> {
        let mut fired = Vec::new();
        while let Some(t) = clock.pop_due(until) {
            if let Some(payload) = gate.handle_timer(&t) {
                fired.push((t.at_ms, payload));
            }
        }
        fired
    }

    #[test]
    fn constructed_gate_waits_for_both() {
        let gate: CompletionGate<Value> = CompletionGate::new(500);
        assert_eq!(gate.state(), GateState::WaitingBoth);
        assert!(!gate.operation_done());
        assert!(!gate.animation_done());
    }

    #[test]
    fn operation_then_animation_fires_once_after_delay() {
        let mut clock = VirtualClock::new();
        let mut gate = CompletionGate::new(500);

        clock.set_now(200);
        assert_eq!(
            gate.report(Signal::Operation(Ok(json!({"status": "safe"}))), &mut clock),
            ReportOutcome::Recorded
        );
        clock.set_now(3_800);
        assert_eq!(gate.report(Signal::Animation, &mut clock), ReportOutcome::Armed);

        assert!(drain(&mut gate, &mut clock, 4_299).is_empty());
        let fired = drain(&mut gate, &mut clock, 10_000);
        assert_eq!(fired, vec![(4_300, json!({"status": "safe"}))]);
        assert_eq!(gate.state(), GateState::Fired);
    }

    #[test]
    fn animation_then_operation_is_identical() {
        let mut clock = VirtualClock::new();
        let mut gate = CompletionGate::new(500);

        clock.set_now(200);
        assert_eq!(gate.report(Signal::Animation, &mut clock), ReportOutcome::Recorded);
        clock.set_now(3_800);
        assert_eq!(
            gate.report(Signal::Operation(Ok(json!({"status": "safe"}))), &mut clock),
            ReportOutcome::Armed
        );

        let fired = drain(&mut gate, &mut clock, 10_000);
        assert_eq!(fired, vec![(4_300, json!({"status": "safe"}))]);
    }

    #[test]
    fn operation_alone_never_fires() {
        let mut clock = VirtualClock::new();
        let mut gate = CompletionGate::new(500);
        gate.report(Signal::Operation(Ok(json!(1))), &mut clock);

        assert!(drain(&mut gate, &mut clock, 1_000_000).is_empty());
        assert_eq!(gate.state(), GateState::WaitingBoth);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn failure_aborts_and_later_animation_is_ignored() {
        let mut clock = VirtualClock::new();
        let mut gate: CompletionGate<Value> = CompletionGate::new(500);

        let outcome = gate.report(
            Signal::Operation(Err(OperationError::Transport("connection reset".into()))),
            &mut clock,
        );
        assert_eq!(outcome, ReportOutcome::Aborted);
        assert_eq!(gate.report(Signal::Animation, &mut clock), ReportOutcome::Ignored);

        assert!(drain(&mut gate, &mut clock, 1_000_000).is_empty());
        assert_eq!(gate.state(), GateState::Aborted);
        assert_eq!(gate.abort_reason(), Some(AbortReason::OperationFailed));
    }

    #[test]
    fn duplicate_reports_keep_the_first_payload() {
        let mut clock = VirtualClock::new();
        let mut gate = CompletionGate::new(0);

        gate.report(Signal::Operation(Ok(json!("first"))), &mut clock);
        assert_eq!(
            gate.report(Signal::Operation(Ok(json!("second"))), &mut clock),
            ReportOutcome::Ignored
        );
        let late = Signal::Operation(Err(OperationError::Transport("late".into())));
        assert_eq!(gate.report(late, &mut clock), ReportOutcome::Ignored);
        assert_eq!(gate.report(Signal::Animation, &mut clock), ReportOutcome::Armed);
        assert_eq!(gate.report(Signal::Animation, &mut clock), ReportOutcome::Ignored);

        let fired = drain(&mut gate, &mut clock, 0);
        assert_eq!(fired, vec![(0, json!("first"))]);
    }

    #[test]
    fn teardown_cancels_pending_delay() {
        let mut clock = VirtualClock::new();
        let mut gate = CompletionGate::new(500);
        gate.report(Signal::Operation(Ok(json!(1))), &mut clock);
        gate.report(Signal::Animation, &mut clock);
        assert_eq!(clock.active_timers(gate.id()).len(), 1);

        assert!(gate.teardown(&mut clock));
        assert!(!gate.teardown(&mut clock));
        assert!(clock.active_timers(gate.id()).is_empty());
        assert_eq!(gate.abort_reason(), Some(AbortReason::TornDown));
        assert_eq!(gate.report(Signal::Animation, &mut clock), ReportOutcome::Ignored);
        assert!(drain(&mut gate, &mut clock, 1_000_000).is_empty());
    }

    #[test]
    fn fired_gate_cannot_be_torn_down() {
        let mut clock = VirtualClock::new();
        let mut gate = CompletionGate::new(10);
        gate.report(Signal::Animation, &mut clock);
        gate.report(Signal::Operation(Ok(json!(1))), &mut clock);
        assert_eq!(drain(&mut gate, &mut clock, 10).len(), 1);
        assert!(!gate.teardown(&mut clock));
        assert_eq!(gate.state(), GateState::Fired);
    }

    proptest! {
        #[test]
        fn any_arrival_order_fires_exactly_once(
            operation_at in 0u64..10_000,
            animation_at in 0u64..10_000,
            delay in 0u64..1_000,
        ) {
            let mut clock = VirtualClock::new();
            let mut gate = CompletionGate::new(delay);
            let mut reports = vec![
                (operation_at, Signal::Operation(Ok(json!({"status": "safe"})))),
                (animation_at, Signal::Animation),
            ];
            reports.sort_by_key(|(at, _)| *at);

            let mut fired = Vec::new();
            for (at, signal) in reports {
                fired.extend(drain(&mut gate, &mut clock, at));
                clock.set_now(at);
                gate.report(signal, &mut clock);
            }
            fired.extend(drain(&mut gate, &mut clock, u64::MAX));

            let expected_at = operation_at.max(animation_at) + delay;
            prop_assert_eq!(fired, vec![(expected_at, json!({"status": "safe"}))]);
        }
    }
}
