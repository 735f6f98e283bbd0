//! Scheduled events for the simulation core.
//!
//! Every state change happens through an event on the scheduler's queue.
//! Events are reversible: each one carries the state it needs to undo
//! itself (the pre-change value of its target pin, plus a journal of the
//! side effects that component callbacks produced while it ran).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Data, PinId, SimTime, WireId};

/// Insertion sequence number of a scheduled event.
///
/// Ids are strictly increasing in scheduling order and break ties between
/// events with the same timestamp. The id also serves as the handle used to
/// cancel a pending event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(u64);

impl EventId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

/// When an event should fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timing {
    /// Relative to the current simulated time.
    After(SimTime),
    /// Absolute simulated time; must not be in the past.
    At(SimTime),
}

/// The unit of work an event performs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Deliver a supplied value to one consumer pin.
    Deliver {
        /// Wire the value travelled over
        wire: WireId,
        /// Supplier pin that produced the value
        source: PinId,
        /// Consumer pin receiving the value
        target: PinId,
        data: Data,
    },

    /// Perform a `write` on a writable pin, as if a driver issued it at the
    /// event's timestamp.
    Stimulus { pin: PinId, data: Data },
}

impl Action {
    pub fn deliver(wire: WireId, source: PinId, target: PinId, data: Data) -> Self {
        Action::Deliver {
            wire,
            source,
            target,
            data,
        }
    }

    pub fn stimulus(pin: PinId, data: Data) -> Self {
        Action::Stimulus { pin, data }
    }

    /// The pin whose value this action changes.
    pub fn target(&self) -> PinId {
        match self {
            Action::Deliver { target, .. } => *target,
            Action::Stimulus { pin, .. } => *pin,
        }
    }

    /// The supplier pin a delivery came from; stimuli have none.
    pub fn source(&self) -> Option<PinId> {
        match self {
            Action::Deliver { source, .. } => Some(*source),
            Action::Stimulus { .. } => None,
        }
    }

    pub fn data(&self) -> Data {
        match self {
            Action::Deliver { data, .. } | Action::Stimulus { data, .. } => *data,
        }
    }
}

/// Side effects recorded while an event executes.
///
/// Component callbacks run inside an event may write pins and thereby
/// schedule further events. Both are logged here so that rolling the event
/// back can withdraw exactly what it caused.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Journal {
    /// Pins overwritten, with their previous values, in write order
    pub(crate) writes: Vec<(PinId, Data)>,
    /// Events scheduled, in scheduling order
    pub(crate) children: Vec<EventId>,
}

impl Journal {
    pub(crate) fn record_write(&mut self, pin: PinId, previous: Data) {
        self.writes.push((pin, previous));
    }

    pub(crate) fn record_child(&mut self, id: EventId) {
        self.children.push(id);
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.children.is_empty()
    }

    pub fn children(&self) -> &[EventId] {
        &self.children
    }
}

/// An event held by the scheduler, either pending or in the history log.
#[derive(Clone, Debug)]
pub struct ScheduledEvent {
    pub id: EventId,
    pub time: SimTime,
    pub action: Action,
    /// Target pin value before the last execution (deliveries only)
    pub(crate) prior: Option<Data>,
    pub(crate) journal: Journal,
    /// Child ids issued by an earlier execution, reused on re-execution
    pub(crate) replay: Vec<EventId>,
}

impl ScheduledEvent {
    pub(crate) fn new(id: EventId, time: SimTime, action: Action) -> Self {
        Self {
            id,
            time,
            action,
            prior: None,
            journal: Journal::default(),
            replay: Vec::new(),
        }
    }

    /// Queue ordering key: timestamp first, then insertion sequence.
    #[inline]
    pub fn key(&self) -> (SimTime, EventId) {
        (self.time, self.id)
    }

    /// Side effects of the last execution, empty while pending.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }
}
