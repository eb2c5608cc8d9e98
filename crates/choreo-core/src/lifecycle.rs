//! Scoped ownership of the timers behind one progress run.
//!
//! The lifecycle holds the tick timer, the pause timer (while paused) and the
//! settle timer (after 100%) of a single run identity. Every exit path goes
//! through [`AnimationLifecycle::finish`] or [`AnimationLifecycle::cancel`],
//! both of which release everything the run still holds.

use serde::{Deserialize, Serialize};

use crate::clock::{OwnerId, TimerId, TimerKind, TimerService};

/// Invoked once when a run completes.
pub type CompletionCallback = Box<dyn FnOnce(&RunSummary) + Send>;

/// What a finished run looked like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub owner: OwnerId,
    pub pattern: String,
    pub steps: u64,
    pub pauses_taken: usize,
    pub started_at_ms: u64,
    pub completed_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    Finished,
    Cancelled,
}

pub struct AnimationLifecycle {
    owner: OwnerId,
    tick: Option<TimerId>,
    pause: Option<TimerId>,
    settle: Option<TimerId>,
    on_complete: Option<CompletionCallback>,
    phase: Phase,
}

impl std::fmt::Debug for AnimationLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationLifecycle")
            .field("owner", &self.owner)
            .field("tick", &self.tick)
            .field("pause", &self.pause)
            .field("settle", &self.settle)
            .field("has_callback", &self.on_complete.is_some())
            .field("phase", &self.phase)
            .finish()
    }
}

impl AnimationLifecycle {
    pub fn new(owner: OwnerId, on_complete: Option<CompletionCallback>) -> Self {
        Self {
            owner,
            tick: None,
            pause: None,
            settle: None,
            on_complete,
            phase: Phase::Active,
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn start_ticks(&mut self, clock: &mut impl TimerService, interval_ms: u64) {
        if !self.is_active() {
            return;
        }
        if let Some(old) = self.tick.take() {
            clock.cancel(old);
        }
        self.tick = Some(clock.start_interval(self.owner, TimerKind::Tick, interval_ms));
    }

    pub fn stop_ticks(&mut self, clock: &mut impl TimerService) {
        if let Some(id) = self.tick.take() {
            clock.cancel(id);
        }
    }

    pub fn start_pause(&mut self, clock: &mut impl TimerService, duration_ms: u64) {
        if !self.is_active() {
            return;
        }
        if let Some(old) = self.pause.take() {
            clock.cancel(old);
        }
        self.pause = Some(clock.start_once(self.owner, TimerKind::Pause, duration_ms));
    }

    /// Forget the pause timer once it has elapsed.
    pub fn end_pause(&mut self, clock: &mut impl TimerService) {
        if let Some(id) = self.pause.take() {
            clock.cancel(id);
        }
    }

    pub fn start_settle(&mut self, clock: &mut impl TimerService, delay_ms: u64) {
        if !self.is_active() {
            return;
        }
        if let Some(old) = self.settle.take() {
            clock.cancel(old);
        }
        self.settle = Some(clock.start_once(self.owner, TimerKind::Settle, delay_ms));
    }

    /// Invoke the completion callback, then release every timer.
    ///
    /// Returns `false` without doing anything if the run already finished or
    /// was cancelled.
    pub fn finish(&mut self, clock: &mut impl TimerService, summary: &RunSummary) -> bool {
        if !self.is_active() {
            return false;
        }
        self.phase = Phase::Finished;
        if let Some(callback) = self.on_complete.take() {
            callback(summary);
        }
        self.release(clock);
        true
    }

    /// Release every timer without invoking the callback. Safe to call any
    /// number of times. Returns how many pending timers were cancelled.
    pub fn cancel(&mut self, clock: &mut impl TimerService) -> usize {
        if self.phase == Phase::Active {
            self.phase = Phase::Cancelled;
        }
        self.on_complete = None;
        self.release(clock)
    }

    fn release(&mut self, clock: &mut impl TimerService) -> usize {
        self.tick = None;
        self.pause = None;
        self.settle = None;
        let released = clock.cancel_owner(self.owner);
        if released > 0 {
            tracing::debug!(owner = %self.owner, released, "run timers released");
        }
        released
    }
}
