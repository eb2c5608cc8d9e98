//! Cancellable timer service and the virtual clock behind it.
//!
//! Every timer belongs to an [`OwnerId`] (one progress run or one completion
//! gate), so an owner can release everything it holds in one call. The
//! [`VirtualClock`] never sleeps: the caller moves time forward and drains due
//! timers with [`VirtualClock::pop_due`], one at a time, in `(due, id)` order.
//! That keeps handlers free to start new timers while draining.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle for one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(u64);

/// Identity of whatever owns a set of timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(Uuid);

impl OwnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

/// What a timer drives when it elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Repeating progress tick.
    Tick,
    /// One-shot end of a pause.
    Pause,
    /// One-shot wait between reaching 100% and signalling completion.
    Settle,
    /// One-shot wait between both gate signals and the downstream transition.
    TransitionDelay,
}

/// A timer that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub id: TimerId,
    pub owner: OwnerId,
    pub kind: TimerKind,
    pub at_ms: u64,
}

/// Scheduling surface used by runs and gates.
pub trait TimerService {
    /// Current time in milliseconds since the clock was created.
    fn now_ms(&self) -> u64;

    /// Schedule a one-shot timer `delay_ms` from now.
    fn start_once(&mut self, owner: OwnerId, kind: TimerKind, delay_ms: u64) -> TimerId;

    /// Schedule a repeating timer that first fires `period_ms` from now.
    fn start_interval(&mut self, owner: OwnerId, kind: TimerKind, period_ms: u64) -> TimerId;

    /// Cancel one timer. Returns `true` if it was still pending.
    fn cancel(&mut self, id: TimerId) -> bool;

    /// Cancel every timer held by `owner`. Returns how many were pending.
    fn cancel_owner(&mut self, owner: OwnerId) -> usize;

    /// Timers still pending for `owner`.
    fn active_timers(&self, owner: OwnerId) -> Vec<TimerId>;

    fn is_active(&self, id: TimerId) -> bool;
}

#[derive(Debug, Clone)]
struct TimerEntry {
    owner: OwnerId,
    kind: TimerKind,
    due_ms: u64,
    period_ms: Option<u64>,
}

/// Deterministic clock driven explicitly by its caller.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now_ms: u64,
    next_id: u64,
    timers: BTreeMap<TimerId, TimerEntry>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Due time of the earliest pending timer.
    pub fn next_due_ms(&self) -> Option<u64> {
        self.timers.values().map(|t| t.due_ms).min()
    }

    /// Total pending timers across all owners.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Remove and return the earliest timer due at or before `until_ms`.
    ///
    /// Moves the clock to the timer's due time. Interval timers are re-armed
    /// one period later instead of being removed.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<TimerFired> {
        let (fired, period_ms) = self
            .timers
            .iter()
            .filter(|(_, t)| t.due_ms <= until_ms)
            .min_by_key(|(id, t)| (t.due_ms, **id))
            .map(|(&id, t)| {
                let fired = TimerFired {
                    id,
                    owner: t.owner,
                    kind: t.kind,
                    at_ms: t.due_ms,
                };
                (fired, t.period_ms)
            })?;
        self.now_ms = self.now_ms.max(fired.at_ms);

        let id = fired.id;
        match period_ms {
            Some(period) => {
                if let Some(t) = self.timers.get_mut(&id) {
                    t.due_ms += period;
                }
            }
            None => {
                self.timers.remove(&id);
            }
        }
        Some(fired)
    }

    /// Move the clock forward without firing anything. Never moves backwards.
    pub fn set_now(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    fn insert(&mut self, entry: TimerEntry) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.insert(id, entry);
        id
    }
}

impl TimerService for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn start_once(&mut self, owner: OwnerId, kind: TimerKind, delay_ms: u64) -> TimerId {
        let due_ms = self.now_ms + delay_ms;
        self.insert(TimerEntry {
            owner,
            kind,
            due_ms,
            period_ms: None,
        })
    }

    fn start_interval(&mut self, owner: OwnerId, kind: TimerKind, period_ms: u64) -> TimerId {
        // A zero period would re-arm at the same instant forever.
        let period = period_ms.max(1);
        let due_ms = self.now_ms + period;
        self.insert(TimerEntry {
            owner,
            kind,
            due_ms,
            period_ms: Some(period),
        })
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    fn cancel_owner(&mut self, owner: OwnerId) -> usize {
        let before = self.timers.len();
        self.timers.retain(|_, t| t.owner != owner);
        before - self.timers.len()
    }

    fn active_timers(&self, owner: OwnerId) -> Vec<TimerId> {
        self.timers
            .iter()
            .filter(|(_, t)| t.owner == owner)
            .map(|(id, _)| *id)
            .collect()
    }

    fn is_active(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_fires_once_at_due_time() {
        let mut clock = VirtualClock::new();
        let owner = OwnerId::new();
        let id = clock.start_once(owner, TimerKind::Settle, 200);

        assert!(clock.pop_due(199).is_none());
        let fired = clock.pop_due(1_000).unwrap();
        assert_eq!(fired.id, id);
        assert_eq!(fired.at_ms, 200);
        assert_eq!(clock.now_ms(), 200);
        assert!(clock.pop_due(1_000).is_none());
    }

    #[test]
    fn interval_rearms_each_period() {
        let mut clock = VirtualClock::new();
        let owner = OwnerId::new();
        clock.start_interval(owner, TimerKind::Tick, 30);

        let times: Vec<u64> = std::iter::from_fn(|| clock.pop_due(100))
            .map(|f| f.at_ms)
            .collect();
        assert_eq!(times, vec![30, 60, 90]);
        assert_eq!(clock.next_due_ms(), Some(120));
    }

    #[test]
    fn same_due_time_fires_in_creation_order() {
        let mut clock = VirtualClock::new();
        let owner = OwnerId::new();
        let first = clock.start_once(owner, TimerKind::Pause, 50);
        let second = clock.start_once(owner, TimerKind::Settle, 50);

        assert_eq!(clock.pop_due(50).unwrap().id, first);
        assert_eq!(clock.pop_due(50).unwrap().id, second);
    }

    #[test]
    fn cancel_owner_only_touches_that_owner() {
        let mut clock = VirtualClock::new();
        let a = OwnerId::new();
        let b = OwnerId::new();
        clock.start_interval(a, TimerKind::Tick, 30);
        clock.start_once(a, TimerKind::Pause, 400);
        let kept = clock.start_once(b, TimerKind::TransitionDelay, 500);

        assert_eq!(clock.cancel_owner(a), 2);
        assert_eq!(clock.cancel_owner(a), 0);
        assert!(clock.active_timers(a).is_empty());
        assert_eq!(clock.active_timers(b), vec![kept]);
    }

    #[test]
    fn set_now_never_rewinds() {
        let mut clock = VirtualClock::new();
        clock.set_now(500);
        clock.set_now(100);
        assert_eq!(clock.now_ms(), 500);
    }
}
