//! Execution trace.
//!
//! When enabled, the scheduler appends one entry per execute and per
//! rollback. Two runs are equivalent exactly when their traces match.

use serde::{Deserialize, Serialize};

use crate::event::{EventId, ScheduledEvent};
use crate::types::{Data, PinId, SimTime};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceKind {
    Executed,
    RolledBack,
}

/// One step of an execution trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub kind: TraceKind,
    pub id: EventId,
    pub time: SimTime,
    /// Supplier pin for deliveries, `None` for stimuli
    pub source: Option<PinId>,
    pub target: PinId,
    pub data: Data,
}

impl TraceEntry {
    pub(crate) fn new(kind: TraceKind, event: &ScheduledEvent) -> Self {
        Self {
            kind,
            id: event.id,
            time: event.time,
            source: event.action.source(),
            target: event.action.target(),
            data: event.action.data(),
        }
    }
}

/// Ordered log of executions and rollbacks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of executed events, in execution order.
    pub fn executed_ids(&self) -> Vec<EventId> {
        self.entries
            .iter()
            .filter(|e| e.kind == TraceKind::Executed)
            .map(|e| e.id)
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
