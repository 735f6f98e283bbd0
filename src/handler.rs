//! Filtered observers of executed and rolled-back events.
//!
//! A handler is registered with an [`EventFilter`] and is called with the
//! [`TraceEntry`] of every event that passes the filter, after the event's
//! effects (including component callbacks) are complete. Handlers observe
//! only; they cannot touch the simulation they are registered on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::trace::{TraceEntry, TraceKind};
use crate::types::PinId;

/// Handle of a registered handler, used to unsubscribe it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HandlerId(u64);

impl HandlerId {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H#{}", self.0)
    }
}

/// Restricts which events reach a handler.
///
/// Each list is a set of accepted values; an empty list accepts anything.
/// An entry matches when it passes all three lists. Stimulus events have no
/// source pin and never pass a non-empty source list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub kinds: Vec<TraceKind>,
    pub sources: Vec<PinId>,
    pub targets: Vec<PinId>,
}

impl EventFilter {
    /// A filter that accepts every event.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: TraceKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn source(mut self, pin: PinId) -> Self {
        self.sources.push(pin);
        self
    }

    pub fn target(mut self, pin: PinId) -> Self {
        self.targets.push(pin);
        self
    }

    pub fn matches(&self, entry: &TraceEntry) -> bool {
        let kind = self.kinds.is_empty() || self.kinds.contains(&entry.kind);
        let source = self.sources.is_empty()
            || entry.source.is_some_and(|pin| self.sources.contains(&pin));
        let target = self.targets.is_empty() || self.targets.contains(&entry.target);
        kind && source && target
    }
}

/// Receives matching events.
pub trait EventHandler: Send {
    fn handle(&mut self, entry: &TraceEntry);
}

impl<F> EventHandler for F
where
    F: FnMut(&TraceEntry) + Send,
{
    fn handle(&mut self, entry: &TraceEntry) {
        self(entry)
    }
}

struct Registration {
    filter: EventFilter,
    handler: Box<dyn EventHandler>,
}

/// Handlers registered on one simulation, called in subscription order.
#[derive(Default)]
pub struct Handlers {
    next_id: u64,
    entries: BTreeMap<HandlerId, Registration>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        filter: EventFilter,
        handler: impl EventHandler + 'static,
    ) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            Registration {
                filter,
                handler: Box::new(handler),
            },
        );
        id
    }

    /// Removes a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: HandlerId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Removes every handler whose filter satisfies `predicate` and returns
    /// how many were removed.
    pub fn unsubscribe_where<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&EventFilter) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|_, reg| !predicate(&reg.filter));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calls every handler whose filter matches `entry`.
    pub fn dispatch(&mut self, entry: &TraceEntry) {
        for reg in self.entries.values_mut() {
            if reg.filter.matches(entry) {
                reg.handler.handle(entry);
            }
        }
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("next_id", &self.next_id)
            .field("filters", &self.entries.values().map(|r| &r.filter).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventId;
    use std::sync::Arc;

    use parking_lot::Mutex;

    fn entry(kind: TraceKind, source: Option<u64>, target: u64) -> TraceEntry {
        TraceEntry {
            kind,
            id: EventId::new(0),
            time: 0,
            source: source.map(PinId::new),
            target: PinId::new(target),
            data: 1,
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = EventFilter::any();
        assert!(filter.matches(&entry(TraceKind::Executed, None, 1)));
        assert!(filter.matches(&entry(TraceKind::RolledBack, Some(2), 3)));
    }

    #[test]
    fn test_filter_fields_combine() {
        let filter = EventFilter::any()
            .kind(TraceKind::Executed)
            .source(PinId::new(1))
            .target(PinId::new(2))
            .target(PinId::new(3));

        assert!(filter.matches(&entry(TraceKind::Executed, Some(1), 2)));
        assert!(filter.matches(&entry(TraceKind::Executed, Some(1), 3)));
        assert!(!filter.matches(&entry(TraceKind::RolledBack, Some(1), 2)));
        assert!(!filter.matches(&entry(TraceKind::Executed, Some(9), 2)));
        assert!(!filter.matches(&entry(TraceKind::Executed, Some(1), 4)));
        assert!(!filter.matches(&entry(TraceKind::Executed, None, 2)));
    }

    #[test]
    fn test_dispatch_and_unsubscribe() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut handlers = Handlers::new();

        let log = seen.clone();
        let id = handlers.subscribe(
            EventFilter::any().target(PinId::new(5)),
            move |e: &TraceEntry| log.lock().push(e.target),
        );
        handlers.dispatch(&entry(TraceKind::Executed, None, 5));
        handlers.dispatch(&entry(TraceKind::Executed, None, 6));
        assert_eq!(*seen.lock(), vec![PinId::new(5)]);

        assert!(handlers.unsubscribe(id));
        assert!(!handlers.unsubscribe(id));
        handlers.dispatch(&entry(TraceKind::Executed, None, 5));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_unsubscribe_where() {
        let mut handlers = Handlers::new();
        handlers.subscribe(EventFilter::any().kind(TraceKind::Executed), |_: &TraceEntry| {});
        handlers.subscribe(EventFilter::any().kind(TraceKind::RolledBack), |_: &TraceEntry| {});
        handlers.subscribe(EventFilter::any(), |_: &TraceEntry| {});

        let removed = handlers.unsubscribe_where(|f| f.kinds.contains(&TraceKind::Executed));
        assert_eq!(removed, 1);
        assert_eq!(handlers.len(), 2);
    }
}
