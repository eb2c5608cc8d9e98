//! Orchestrates one audit attempt: a progress run plus its completion gate.
//!
//! The choreographer owns the virtual clock, the current
//! [`ProgressScheduler`] and the current [`CompletionGate`]. The run's
//! completion is fed to the gate as the animation signal; the caller feeds
//! the analysis result through [`Choreographer::report_operation`]. Nothing
//! here sleeps: callers move time with [`Choreographer::advance_to`] and get
//! back the events each step produced.
//!
//! ## Attempt lifecycle
//!
//! ```text
//! begin -> in flight -> Transition        (gate fired)
//!              |
//!              +-> OperationFailed        (gate aborted, run cancelled)
//!              +-> cancel / sign-out      (both torn down)
//! ```
//!
//! Only one attempt is in flight at a time. Once the gate has fired or the
//! attempt failed, `begin` starts a fresh one.

use crate::analysis::AnalysisResult;
use crate::clock::{OwnerId, TimerFired, TimerKind, TimerService, VirtualClock};
use crate::config::ChoreoConfig;
use crate::error::{CoreError, OperationError, Result};
use crate::events::Event;
use crate::gate::{AbortReason, CompletionGate, GateState, ReportOutcome, Signal, SignalSource};
use crate::lifecycle::CompletionCallback;
use crate::pattern::{Pacing, PatternSelector, TimingPattern};
use crate::progress::{ProgressScheduler, ProgressView};

#[derive(Debug)]
pub struct Choreographer {
    clock: VirtualClock,
    pacing: Pacing,
    transition_delay_ms: u64,
    selector: PatternSelector,
    run: Option<ProgressScheduler>,
    gate: Option<CompletionGate<AnalysisResult>>,
    last_error: Option<String>,
}

impl Choreographer {
    /// Build from configuration. Fails if the pacing or any pattern is invalid.
    pub fn new(config: &ChoreoConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_parts(
            config.pacing.clone(),
            config.gate.transition_delay_ms,
            config.selector()?,
        ))
    }

    pub fn with_parts(pacing: Pacing, transition_delay_ms: u64, selector: PatternSelector) -> Self {
        Self {
            clock: VirtualClock::new(),
            pacing,
            transition_delay_ms,
            selector,
            run: None,
            gate: None,
            last_error: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// When the next timer is due, if any is pending.
    pub fn next_due_ms(&self) -> Option<u64> {
        self.clock.next_due_ms()
    }

    /// Timers pending across the run and the gate.
    pub fn active_timer_count(&self) -> usize {
        self.clock.pending()
    }

    /// Timers pending for one owner (a run or a gate).
    pub fn active_timers_for(&self, owner: OwnerId) -> usize {
        self.clock.active_timers(owner).len()
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    pub fn selector(&self) -> &PatternSelector {
        &self.selector
    }

    /// Snapshot of the current run, `None` before the first attempt or after
    /// a teardown.
    pub fn view(&self) -> Option<ProgressView> {
        self.run.as_ref().map(ProgressScheduler::view)
    }

    pub fn run_owner(&self) -> Option<OwnerId> {
        self.run.as_ref().map(ProgressScheduler::owner)
    }

    pub fn gate_owner(&self) -> Option<OwnerId> {
        self.gate.as_ref().map(CompletionGate::id)
    }

    /// `Idle` when no gate exists.
    pub fn gate_state(&self) -> GateState {
        self.gate
            .as_ref()
            .map_or(GateState::Idle, CompletionGate::state)
    }

    /// User-visible message from the last failed attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True while the gate is still waiting on either signal.
    pub fn is_in_flight(&self) -> bool {
        self.gate_state() == GateState::WaitingBoth
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a new attempt with a pattern from the selector.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Busy`] while another attempt is in flight.
    pub fn begin(&mut self) -> Result<Vec<Event>> {
        if self.is_in_flight() {
            return Err(CoreError::Busy);
        }
        let pattern = self.selector.select();
        self.begin_with(pattern, None)
    }

    /// Start a new attempt with an explicit pattern and an optional callback
    /// that runs when the animation completes.
    pub fn begin_with(
        &mut self,
        pattern: TimingPattern,
        on_complete: Option<CompletionCallback>,
    ) -> Result<Vec<Event>> {
        if self.is_in_flight() {
            return Err(CoreError::Busy);
        }
        let run = ProgressScheduler::new(pattern, self.pacing.clone(), on_complete)?;
        let mut events = self.teardown();
        self.last_error = None;

        let gate = CompletionGate::new(self.transition_delay_ms);
        events.push(Event::GateOpened {
            gate: gate.id(),
            at_ms: self.clock.now_ms(),
        });
        self.gate = Some(gate);

        let run = self.run.insert(run);
        events.extend(run.start(&mut self.clock));
        Ok(events)
    }

    /// Tear down whatever is in flight and begin again.
    pub fn restart(&mut self) -> Result<Vec<Event>> {
        let mut events = self.cancel();
        events.extend(self.begin()?);
        Ok(events)
    }

    /// Feed the analysis outcome into the gate.
    ///
    /// A failure aborts the gate, cancels the animation and records the
    /// message for the user; the choreographer is then ready for a retry.
    pub fn report_operation(
        &mut self,
        outcome: std::result::Result<AnalysisResult, OperationError>,
    ) -> Vec<Event> {
        let Some(gate) = self.gate.as_mut() else {
            tracing::warn!("operation reported with no attempt in flight");
            return Vec::new();
        };
        let gate_id = gate.id();
        let at_ms = self.clock.now_ms();

        let message = outcome.as_ref().err().map(ToString::to_string);
        let reported = gate.report(Signal::Operation(outcome), &mut self.clock);
        let mut events = Self::report_events(
            gate_id,
            SignalSource::Operation,
            reported,
            self.transition_delay_ms,
            at_ms,
        );

        if reported == ReportOutcome::Aborted {
            events.push(Event::GateAborted {
                gate: gate_id,
                reason: AbortReason::OperationFailed,
                at_ms,
            });
            if let Some(run) = self.run.as_mut() {
                events.extend(run.cancel(&mut self.clock));
            }
            let message = message.unwrap_or_default();
            tracing::warn!(gate = %gate_id, error = %message, "audit attempt failed");
            events.push(Event::OperationFailed {
                message: message.clone(),
                at_ms,
            });
            self.last_error = Some(message);
            self.run = None;
            self.gate = None;
        }
        events
    }

    /// Fire every timer due up to `until_ms`, in order, then move the clock
    /// to `until_ms`.
    pub fn advance_to(&mut self, until_ms: u64) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(fired) = self.clock.pop_due(until_ms) {
            events.extend(self.dispatch(fired));
        }
        self.clock.set_now(until_ms);
        events
    }

    pub fn advance_by(&mut self, delta_ms: u64) -> Vec<Event> {
        let until = self.clock.now_ms().saturating_add(delta_ms);
        self.advance_to(until)
    }

    /// Tear down the attempt in flight. Idempotent; a fired gate and a
    /// finished run are left in place.
    pub fn cancel(&mut self) -> Vec<Event> {
        if !self.is_in_flight() {
            return Vec::new();
        }
        let events = self.teardown();
        self.run = None;
        self.gate = None;
        tracing::debug!("attempt cancelled");
        events
    }

    /// Session-change notification. Signing out tears down the attempt.
    pub fn session_changed(&mut self, signed_in: bool) -> Vec<Event> {
        if signed_in {
            return Vec::new();
        }
        tracing::info!("session ended; tearing down attempt");
        self.cancel()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn dispatch(&mut self, fired: TimerFired) -> Vec<Event> {
        if fired.kind == TimerKind::TransitionDelay {
            if let Some(gate) = self.gate.as_mut().filter(|g| g.id() == fired.owner) {
                return match gate.handle_timer(&fired) {
                    Some(result) => vec![
                        Event::GateFired {
                            gate: gate.id(),
                            at_ms: fired.at_ms,
                        },
                        Event::Transition {
                            result,
                            at_ms: fired.at_ms,
                        },
                    ],
                    None => Vec::new(),
                };
            }
        } else if let Some(run) = self.run.as_mut().filter(|r| r.owner() == fired.owner) {
            let events = run.handle_timer(&fired, &mut self.clock);
            let completed = events
                .iter()
                .any(|e| matches!(e, Event::RunCompleted { .. }));
            let mut out = events;
            if completed {
                out.extend(self.report_animation());
            }
            return out;
        }

        tracing::warn!(
            timer = ?fired.id,
            owner = %fired.owner,
            kind = ?fired.kind,
            "stray timer cancelled"
        );
        self.clock.cancel(fired.id);
        Vec::new()
    }

    fn report_animation(&mut self) -> Vec<Event> {
        let Some(gate) = self.gate.as_mut() else {
            return Vec::new();
        };
        let gate_id = gate.id();
        let at_ms = self.clock.now_ms();
        let reported = gate.report(Signal::Animation, &mut self.clock);
        Self::report_events(
            gate_id,
            SignalSource::Animation,
            reported,
            self.transition_delay_ms,
            at_ms,
        )
    }

    fn report_events(
        gate: OwnerId,
        source: SignalSource,
        outcome: ReportOutcome,
        delay_ms: u64,
        at_ms: u64,
    ) -> Vec<Event> {
        match outcome {
            ReportOutcome::Ignored => Vec::new(),
            ReportOutcome::Recorded | ReportOutcome::Aborted => {
                vec![Event::SignalReported { gate, source, at_ms }]
            }
            ReportOutcome::Armed => vec![
                Event::SignalReported { gate, source, at_ms },
                Event::GateArmed {
                    gate,
                    delay_ms,
                    at_ms,
                },
            ],
        }
    }

    /// Abort the gate and cancel the run if they are still live.
    fn teardown(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        let at_ms = self.clock.now_ms();
        if let Some(gate) = self.gate.as_mut() {
            if gate.teardown(&mut self.clock) {
                events.push(Event::GateAborted {
                    gate: gate.id(),
                    reason: AbortReason::TornDown,
                    at_ms,
                });
            }
        }
        if let Some(run) = self.run.as_mut() {
            events.extend(run.cancel(&mut self.clock));
        }
        events
    }
}
