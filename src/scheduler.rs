//! Reversible event scheduler.
//!
//! Pending events live in a `BTreeMap` keyed by `(timestamp, EventId)`, so
//! iteration order is the execution order: earliest time first, and among
//! equal times the event scheduled first. Executed events move to a history
//! log (when enabled) from which `retreat` pops them again, last executed
//! first.
//!
//! The scheduler owns the queue, the history and the clock. Running events
//! needs the signal graph and the component callbacks, so the execute and
//! rollback loop lives in [`Simulation`](crate::engine::Simulation); this
//! type provides the queue primitives it is built from.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::clock::Clock;
use crate::error::{SimError, SimResult};
use crate::event::{Action, EventId, ScheduledEvent, Timing};
use crate::stats::SchedulerStats;
use crate::trace::{Trace, TraceEntry};
use crate::types::SimTime;

/// What the scheduler is doing right now.
///
/// `Advancing` and `Retreating` last for the duration of a single
/// `advance`/`retreat`/`jump` call. Component callbacks can observe the
/// state through their context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    #[default]
    Idle,
    Advancing,
    Retreating,
}

/// Ordered, reversible event queue plus the simulation clock.
#[derive(Debug)]
pub struct Scheduler {
    clock: Clock,
    state: SchedulerState,
    pending: BTreeMap<(SimTime, EventId), ScheduledEvent>,
    /// Timestamp of each pending event, for lookups by handle
    pending_times: HashMap<EventId, SimTime>,
    /// Executed events in execution order
    history: VecDeque<ScheduledEvent>,
    keep_history: bool,
    history_limit: Option<usize>,
    /// Latest timestamp of any executed event that was dropped from history
    horizon: Option<SimTime>,
    next_id: u64,
    /// Ids that were minted but are neither pending nor executed
    withdrawn: HashSet<EventId>,
    /// Ids handed out before minting new ones while an event re-executes
    reserved: VecDeque<EventId>,
    /// Child ids of withdrawn events, restored if the id is issued again
    replays: HashMap<EventId, Vec<EventId>>,
    trace: Option<Trace>,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Creates a scheduler at time zero with history enabled.
    pub fn new() -> Self {
        Self::with_history(true)
    }

    pub fn with_history(keep_history: bool) -> Self {
        Self {
            clock: Clock::new(),
            state: SchedulerState::Idle,
            pending: BTreeMap::new(),
            pending_times: HashMap::new(),
            history: VecDeque::new(),
            keep_history,
            history_limit: None,
            horizon: None,
            next_id: 0,
            withdrawn: HashSet::new(),
            reserved: VecDeque::new(),
            replays: HashMap::new(),
            trace: None,
            stats: SchedulerStats::default(),
        }
    }

    /// Bounds the number of retained history entries.
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self.prune();
        self
    }

    /// Enables or disables the execution trace.
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled.then(Trace::new);
        self
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn keep_history(&self) -> bool {
        self.keep_history
    }

    pub fn history_limit(&self) -> Option<usize> {
        self.history_limit
    }

    /// Latest timestamp that can no longer be rolled back, if any.
    pub fn horizon(&self) -> Option<SimTime> {
        self.horizon
    }

    /// Turns history retention on or off.
    ///
    /// Turning it off discards the current history, which moves the
    /// rollback horizon up to the latest executed event.
    pub fn set_keep_history(&mut self, keep: bool) {
        self.keep_history = keep;
        if !keep {
            while let Some(event) = self.history.pop_front() {
                self.discard(event);
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending_times.contains_key(&id)
    }

    /// Timestamp of the next event due, if any.
    pub fn peek_next_time(&self) -> Option<SimTime> {
        self.pending.keys().next().map(|&(time, _)| time)
    }

    /// Pending events in execution order.
    pub fn pending(&self) -> impl Iterator<Item = &ScheduledEvent> {
        self.pending.values()
    }

    /// Retained executed events in execution order.
    pub fn history(&self) -> impl Iterator<Item = &ScheduledEvent> {
        self.history.iter()
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut SchedulerStats {
        &mut self.stats
    }

    /// Converts a timing request to an absolute timestamp.
    pub fn resolve(&self, timing: Timing) -> SimResult<SimTime> {
        match timing {
            Timing::After(delay) => self.clock.ahead(delay),
            Timing::At(time) if time < self.now() => Err(SimError::NonCausal {
                requested: time,
                current: self.now(),
            }),
            Timing::At(time) => Ok(time),
        }
    }

    /// Validates `timing` and queues `action`, returning its handle.
    ///
    /// The action itself is not checked against the graph here; callers
    /// going through [`Simulation`](crate::engine::Simulation) get that.
    pub(crate) fn schedule(&mut self, action: Action, timing: Timing) -> SimResult<EventId> {
        let time = self.resolve(timing)?;
        Ok(self.insert(time, action))
    }

    /// Queues an action at an already validated timestamp.
    pub(crate) fn insert(&mut self, time: SimTime, action: Action) -> EventId {
        let id = match self.reserved.pop_front() {
            Some(id) => id,
            None => self.mint(),
        };
        self.withdrawn.remove(&id);
        let mut event = ScheduledEvent::new(id, time, action);
        if let Some(replay) = self.replays.remove(&id) {
            event.replay = replay;
        }
        self.pending_times.insert(id, time);
        self.pending.insert((time, id), event);

        self.stats.scheduled += 1;
        self.stats.observe_pending(self.pending.len());
        id
    }

    fn mint(&mut self) -> EventId {
        let id = EventId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Withdraws a pending event by handle.
    ///
    /// Fails with `AlreadyExecuted` for events that have run; those can
    /// only be undone by retreating.
    pub(crate) fn cancel(&mut self, id: EventId) -> SimResult<ScheduledEvent> {
        match self.take_pending(id) {
            Some(event) => {
                self.stats.cancelled += 1;
                Ok(event)
            }
            None if id.raw() >= self.next_id || self.withdrawn.contains(&id) => {
                Err(SimError::UnknownEvent(id))
            }
            None => Err(SimError::AlreadyExecuted(id)),
        }
    }

    /// Withdraws a pending child of an event being rolled back.
    ///
    /// The withdrawn event's own replay ids are kept so that, if its id is
    /// issued again, it re-issues the same children.
    pub(crate) fn withdraw(&mut self, id: EventId) -> bool {
        match self.take_pending(id) {
            Some(event) => {
                self.stats.withdrawn += 1;
                if !event.replay.is_empty() {
                    self.replays.insert(id, event.replay);
                }
                true
            }
            None => false,
        }
    }

    fn take_pending(&mut self, id: EventId) -> Option<ScheduledEvent> {
        let time = self.pending_times.remove(&id)?;
        let event = self.pending.remove(&(time, id))?;
        self.withdrawn.insert(id);
        Some(event)
    }

    /// True if `id` was minted and is currently neither pending nor executed.
    pub(crate) fn is_withdrawn(&self, id: EventId) -> bool {
        self.withdrawn.contains(&id)
    }

    /// Removes the earliest pending event if it is due at or before `target`.
    pub(crate) fn pop_due(&mut self, target: SimTime) -> Option<ScheduledEvent> {
        let key = *self.pending.keys().next()?;
        if key.0 > target {
            return None;
        }
        let event = self.pending.remove(&key)?;
        self.pending_times.remove(&event.id);
        Some(event)
    }

    /// Files an executed event into history, or discards it.
    pub(crate) fn retire(&mut self, event: ScheduledEvent) {
        self.stats.executed += 1;
        if self.keep_history {
            self.history.push_back(event);
            self.prune();
        } else {
            self.discard(event);
        }
    }

    fn prune(&mut self) {
        let Some(limit) = self.history_limit else {
            return;
        };
        while self.history.len() > limit {
            match self.history.pop_front() {
                Some(event) => {
                    tracing::debug!(event = %event.id, time = event.time, "pruned from history");
                    self.discard(event);
                }
                None => break,
            }
        }
    }

    fn discard(&mut self, event: ScheduledEvent) {
        self.horizon = Some(self.horizon.map_or(event.time, |h| h.max(event.time)));
        self.stats.discarded += 1;
    }

    /// Computes the retreat target, failing before anything is mutated if
    /// an event that would need undoing is gone.
    pub(crate) fn plan_retreat(&self, diff: SimTime) -> SimResult<SimTime> {
        let now = self.now();
        if diff == 0 {
            return Ok(now);
        }
        if !self.keep_history {
            return Err(SimError::HistoryUnavailable {
                horizon: now,
                target: now.saturating_sub(diff),
            });
        }
        let target = self.clock.behind(diff)?;
        if let Some(horizon) = self.horizon {
            if horizon > target {
                return Err(SimError::HistoryUnavailable { horizon, target });
            }
        }
        Ok(target)
    }

    /// Pops the most recently executed event if it lies after `target`.
    pub(crate) fn pop_undoable(&mut self, target: SimTime) -> Option<ScheduledEvent> {
        if self.history.back()?.time > target {
            self.history.pop_back()
        } else {
            None
        }
    }

    /// Returns a rolled-back event to the pending queue under its original key.
    pub(crate) fn requeue(&mut self, event: ScheduledEvent) {
        self.stats.rolled_back += 1;
        self.pending_times.insert(event.id, event.time);
        self.pending.insert(event.key(), event);
        self.stats.observe_pending(self.pending.len());
    }

    pub(crate) fn begin(&mut self, state: SchedulerState) {
        debug_assert_eq!(self.state, SchedulerState::Idle);
        self.state = state;
    }

    pub(crate) fn finish(&mut self, time: SimTime) {
        self.clock.set(time);
        self.state = SchedulerState::Idle;
        self.reserved.clear();
    }

    pub(crate) fn set_time(&mut self, time: SimTime) {
        self.clock.set(time);
    }

    /// Makes the next `insert` calls reuse `ids` in order.
    pub(crate) fn reserve(&mut self, ids: Vec<EventId>) {
        self.reserved = ids.into();
    }

    /// Drops any reserved ids that were not needed.
    pub(crate) fn release(&mut self) {
        self.reserved.clear();
    }

    pub(crate) fn record(&mut self, entry: TraceEntry) {
        if let Some(trace) = self.trace.as_mut() {
            trace.push(entry);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
