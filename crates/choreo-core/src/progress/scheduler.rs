//! Tick-driven progress scheduler.
//!
//! The scheduler is a state machine that never sleeps: the caller feeds it
//! the timers its lifecycle scheduled, and each handler returns the events it
//! produced.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |
//!            v
//!        Completed -> (settle) -> callback
//!
//! any non-finished phase -> Cancelled
//! ```

use super::state::{ProgressState, ProgressView, RunPhase};
use crate::clock::{OwnerId, TimerFired, TimerKind, TimerService};
use crate::error::PatternConfigError;
use crate::events::Event;
use crate::lifecycle::{AnimationLifecycle, CompletionCallback, RunSummary};
use crate::pattern::{Pacing, TimingPattern};

/// Drives one progress run for one timing pattern.
#[derive(Debug)]
pub struct ProgressScheduler {
    pattern: TimingPattern,
    pacing: Pacing,
    state: ProgressState,
    phase: RunPhase,
    lifecycle: AnimationLifecycle,
    started_at_ms: u64,
    pauses_taken: usize,
}

impl ProgressScheduler {
    /// Create a run in the `Idle` phase. Rejects patterns that do not fit the
    /// pacing before any timer is acquired.
    pub fn new(
        pattern: TimingPattern,
        pacing: Pacing,
        on_complete: Option<CompletionCallback>,
    ) -> Result<Self, PatternConfigError> {
        pattern.validate(&pacing)?;
        Ok(Self {
            pattern,
            pacing,
            state: ProgressState::default(),
            phase: RunPhase::Idle,
            lifecycle: AnimationLifecycle::new(OwnerId::new(), on_complete),
            started_at_ms: 0,
            pauses_taken: 0,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn owner(&self) -> OwnerId {
        self.lifecycle.owner()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn pattern(&self) -> &TimingPattern {
        &self.pattern
    }

    /// True once the completion callback has run.
    pub fn is_finished(&self) -> bool {
        self.phase == RunPhase::Completed && !self.lifecycle.is_active()
    }

    pub fn view(&self) -> ProgressView {
        ProgressView {
            phase: self.phase,
            progress: self.state.progress,
            segment: self.state.segment,
            total_segments: self.pacing.total_segments,
            paused: self.state.paused,
            looking_ahead: self.state.looking_ahead,
            pattern: self.pattern.name.clone(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, clock: &mut impl TimerService) -> Option<Event> {
        if self.phase != RunPhase::Idle {
            return None;
        }
        self.phase = RunPhase::Running;
        self.started_at_ms = clock.now_ms();
        self.lifecycle.start_ticks(clock, self.pacing.tick_interval_ms);
        tracing::info!(run = %self.owner(), pattern = %self.pattern.name, "progress run started");
        Some(Event::RunStarted {
            run: self.owner(),
            pattern: self.pattern.name.clone(),
            at_ms: self.started_at_ms,
        })
    }

    /// Route an elapsed timer. Timers owned by someone else are ignored.
    pub fn handle_timer(
        &mut self,
        fired: &TimerFired,
        clock: &mut impl TimerService,
    ) -> Vec<Event> {
        if fired.owner != self.owner() {
            return Vec::new();
        }
        match fired.kind {
            TimerKind::Tick => self.tick(clock),
            TimerKind::Pause => self.resume(clock).into_iter().collect(),
            TimerKind::Settle => self.settle(clock).into_iter().collect(),
            TimerKind::TransitionDelay => Vec::new(),
        }
    }

    /// Stop the run and release its timers without signalling completion.
    /// Returns `None` if the run had already finished or been cancelled.
    pub fn cancel(&mut self, clock: &mut impl TimerService) -> Option<Event> {
        if !self.lifecycle.is_active() {
            return None;
        }
        self.lifecycle.cancel(clock);
        self.phase = RunPhase::Cancelled;
        self.state.paused = false;
        self.state.looking_ahead = false;
        tracing::debug!(
            run = %self.owner(),
            progress = self.state.progress,
            "progress run cancelled"
        );
        Some(Event::RunCancelled {
            run: self.owner(),
            progress: self.state.progress,
            at_ms: clock.now_ms(),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn tick(&mut self, clock: &mut impl TimerService) -> Vec<Event> {
        if self.phase != RunPhase::Running {
            return Vec::new();
        }
        let mut events = Vec::new();

        self.state.step += 1;
        let speed = self
            .pattern
            .speed_for_segment(self.pacing.segment_at_step(self.state.step));
        let next = (self.state.progress + self.pacing.base_increment() * speed).min(100.0);
        self.state.progress = next;

        let reached = self.pacing.segment_for_progress(next);
        self.state.segment = reached.min(self.pacing.total_segments - 1);

        if self.state.step > self.pacing.warmup_ticks {
            if let Some(event) = self.maybe_pause(reached, clock) {
                events.push(event);
            }
        }

        if next >= 100.0 {
            self.phase = RunPhase::Completed;
            self.state.paused = false;
            self.state.looking_ahead = false;
            self.lifecycle.end_pause(clock);
            self.lifecycle.stop_ticks(clock);
            self.lifecycle.start_settle(clock, self.pacing.settle_delay_ms);
            events.push(Event::RunReachedFull {
                run: self.owner(),
                step: self.state.step,
                at_ms: clock.now_ms(),
            });
        }
        events
    }

    /// Pause when `segment` is a pause point at or past the cursor. A point
    /// behind the cursor was already consumed (or skipped) and never
    /// triggers again. Durations are taken in declaration order, one per
    /// pause actually taken.
    fn maybe_pause(&mut self, segment: usize, clock: &mut impl TimerService) -> Option<Event> {
        let position = self.pattern.pause_position(segment)?;
        if position < self.state.pause_cursor {
            return None;
        }
        let duration_ms = self.pattern.pause_duration_ms(self.pauses_taken)?;

        self.state.pause_cursor = position + 1;
        self.state.paused = true;
        self.state.looking_ahead = true;
        self.phase = RunPhase::Paused;
        self.pauses_taken += 1;
        self.lifecycle.start_pause(clock, duration_ms);
        tracing::debug!(run = %self.owner(), segment, duration_ms, "progress paused");

        Some(Event::RunPaused {
            run: self.owner(),
            segment,
            progress: self.state.progress,
            duration_ms,
            at_ms: clock.now_ms(),
        })
    }

    fn resume(&mut self, clock: &mut impl TimerService) -> Option<Event> {
        if self.phase != RunPhase::Paused {
            return None;
        }
        self.lifecycle.end_pause(clock);
        self.state.paused = false;
        self.state.looking_ahead = false;
        self.phase = RunPhase::Running;
        tracing::debug!(run = %self.owner(), "progress resumed");
        Some(Event::RunResumed {
            run: self.owner(),
            progress: self.state.progress,
            at_ms: clock.now_ms(),
        })
    }

    fn settle(&mut self, clock: &mut impl TimerService) -> Option<Event> {
        if self.phase != RunPhase::Completed {
            return None;
        }
        let summary = RunSummary {
            owner: self.owner(),
            pattern: self.pattern.name.clone(),
            steps: self.state.step,
            pauses_taken: self.pauses_taken,
            started_at_ms: self.started_at_ms,
            completed_at_ms: clock.now_ms(),
        };
        if !self.lifecycle.finish(clock, &summary) {
            return None;
        }
        tracing::info!(
            run = %summary.owner,
            steps = summary.steps,
            elapsed_ms = summary.completed_at_ms - summary.started_at_ms,
            "progress run completed"
        );
        Some(Event::RunCompleted {
            run: summary.owner,
            steps: summary.steps,
            pauses_taken: summary.pauses_taken,
            at_ms: summary.completed_at_ms,
        })
    }
}
