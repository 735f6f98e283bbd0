//! Simulation engine (coordinator).
//!
//! A `Simulation` ties together the signal graph, the reversible scheduler
//! and the component behaviours. It is the entry point for drivers: build
//! the topology, write pins, schedule stimuli, then move time with
//! [`advance`](Simulation::advance), [`retreat`](Simulation::retreat) or
//! [`jump`](Simulation::jump).
//!
//! # Example
//!
//! ```rust
//! use logy::{component::Passive, Capability, Probe, Simulation};
//!
//! let mut sim = Simulation::new();
//! let a = sim.add_component("a", Passive);
//! let probe = Probe::new();
//! let b = sim.add_component("b", probe.clone());
//!
//! let out = sim.add_pin(a, "out", 1, Capability::Writeable).unwrap();
//! let inp = sim.add_pin(b, "in", 1, Capability::Readable).unwrap();
//! let w = sim.add_wire("w");
//! sim.attach(out, w, 0).unwrap();
//! sim.attach(inp, w, 2).unwrap();
//!
//! sim.write(out, 1).unwrap();
//! sim.advance(2).unwrap();
//! assert_eq!(sim.read(inp).unwrap(), 1);
//! assert_eq!(probe.count(), 1);
//!
//! sim.retreat(2).unwrap();
//! assert_eq!(sim.read(inp).unwrap(), 0);
//! ```

use std::collections::BTreeMap;

use crate::component::{Component, Context};
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::event::{Action, EventId, Journal, ScheduledEvent, Timing};
use crate::graph::{ComponentNode, Graph};
use crate::handler::{EventFilter, EventHandler, HandlerId, Handlers};
use crate::pin::{Capability, Pin};
use crate::propagation;
use crate::scheduler::{Scheduler, SchedulerState};
use crate::stats::SchedulerStats;
use crate::trace::{Trace, TraceEntry, TraceKind};
use crate::types::{ComponentId, Data, PinId, SimTime, WireId};
use crate::wire::{Role, Wire};

/// A single, self-contained reversible simulation.
pub struct Simulation {
    graph: Graph,
    scheduler: Scheduler,
    /// Behaviour of each component, kept apart from the graph so callbacks
    /// can borrow the graph mutably
    behaviors: BTreeMap<ComponentId, Box<dyn Component>>,
    handlers: Handlers,
}

impl Simulation {
    /// Creates an empty simulation at time zero with history enabled.
    pub fn new() -> Self {
        Self::with_scheduler(Scheduler::new())
    }

    pub fn with_scheduler(scheduler: Scheduler) -> Self {
        Self {
            graph: Graph::new(),
            scheduler,
            behaviors: BTreeMap::new(),
            handlers: Handlers::new(),
        }
    }

    /// Builds a simulation from loaded configuration.
    pub fn from_config(config: &SimConfig) -> Self {
        let params = &config.simulation;
        Self::with_scheduler(
            Scheduler::with_history(params.keep_history)
                .with_history_limit(params.history_limit)
                .with_trace(params.record_trace),
        )
    }

    pub fn with_history(mut self, keep: bool) -> Self {
        self.scheduler.set_keep_history(keep);
        self
    }

    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.scheduler = std::mem::take(&mut self.scheduler).with_history_limit(limit);
        self
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.scheduler = std::mem::take(&mut self.scheduler).with_trace(enabled);
        self
    }

    // ----- topology -----

    /// Registers a component and its behaviour.
    pub fn add_component(
        &mut self,
        name: impl Into<String>,
        behavior: impl Component + 'static,
    ) -> ComponentId {
        let id = self.graph.add_component(name);
        self.behaviors.insert(id, Box::new(behavior));
        id
    }

    pub fn add_pin(
        &mut self,
        component: ComponentId,
        name: impl Into<String>,
        bandwidth: u32,
        capability: Capability,
    ) -> SimResult<PinId> {
        self.graph.add_pin(component, name, bandwidth, capability)
    }

    pub fn add_wire(&mut self, name: impl Into<String>) -> WireId {
        self.graph.add_wire(name)
    }

    /// Attaches `pin` to `wire` with the given delivery delay.
    ///
    /// Re-attaching an attached pin only updates its delay.
    pub fn attach(&mut self, pin: PinId, wire: WireId, delay: SimTime) -> SimResult<()> {
        self.graph.attach(pin, wire, delay)
    }

    /// Detaches `pin` from `wire`. Returns `false` if it was not attached.
    pub fn detach(&mut self, pin: PinId, wire: WireId) -> SimResult<bool> {
        self.graph.detach(pin, wire)
    }

    pub fn set_delay(&mut self, pin: PinId, wire: WireId, delay: SimTime) -> SimResult<()> {
        self.graph.set_delay(pin, wire, delay)
    }

    pub fn delay(&self, pin: PinId, wire: WireId) -> SimResult<SimTime> {
        self.graph.delay(pin, wire)
    }

    pub fn role(&self, pin: PinId, wire: WireId) -> SimResult<Role> {
        self.graph.role(pin, wire)
    }

    /// Removes a wire, detaching every pin first.
    pub fn remove_wire(&mut self, wire: WireId) -> SimResult<()> {
        self.graph.remove_wire(wire)
    }

    /// Removes a component, its pins and its behaviour.
    ///
    /// Deliveries still pending for its pins are skipped when they come due.
    pub fn remove_component(&mut self, component: ComponentId) -> SimResult<()> {
        let pins = self.graph.remove_component(component)?;
        self.behaviors.remove(&component);
        tracing::debug!(component = %component, pins = pins.len(), "component removed");
        Ok(())
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn component(&self, id: ComponentId) -> SimResult<&ComponentNode> {
        self.graph.component(id)
    }

    pub fn pin(&self, id: PinId) -> SimResult<&Pin> {
        self.graph.pin(id)
    }

    pub fn wire(&self, id: WireId) -> SimResult<&Wire> {
        self.graph.wire(id)
    }

    pub fn pin_by_name(&self, component: ComponentId, name: &str) -> SimResult<PinId> {
        self.graph.pin_by_name(component, name)
    }

    // ----- signal access -----

    /// Reads a readable pin's cached value.
    pub fn read(&self, pin: PinId) -> SimResult<Data> {
        self.graph.read(pin)
    }

    /// Writes a writable pin and schedules deliveries to its consumers.
    ///
    /// Writes made by a driver between time moves are not journaled, so a
    /// later retreat does not undo them. Use
    /// [`schedule_write`](Self::schedule_write) for a reversible write.
    pub fn write(&mut self, pin: PinId, data: Data) -> SimResult<()> {
        propagation::write(&mut self.graph, &mut self.scheduler, None, pin, data)
    }

    /// Schedules delivery of `data` from `supplier` to every consumer of `wire`.
    pub fn supply(&mut self, wire: WireId, supplier: PinId, data: Data) -> SimResult<Vec<EventId>> {
        propagation::supply(&self.graph, &mut self.scheduler, None, wire, supplier, data)
    }

    /// Runs a component's `update` with no triggering pin.
    pub fn refresh(&mut self, component: ComponentId) -> SimResult<()> {
        self.graph.component(component)?;
        self.notify(component, None, None);
        Ok(())
    }

    // ----- scheduling -----

    /// Queues an action after checking it against the graph.
    pub fn schedule(&mut self, action: Action, timing: Timing) -> SimResult<EventId> {
        self.validate(&action)?;
        let id = self.scheduler.schedule(action, timing)?;
        tracing::trace!(event = %id, "event scheduled");
        Ok(id)
    }

    /// Schedules a reversible write of `data` to a writable pin.
    pub fn schedule_write(&mut self, pin: PinId, data: Data, timing: Timing) -> SimResult<EventId> {
        self.schedule(Action::stimulus(pin, data), timing)
    }

    /// Withdraws a pending event.
    pub fn cancel(&mut self, id: EventId) -> SimResult<()> {
        let event = self.scheduler.cancel(id)?;
        tracing::debug!(event = %id, time = event.time, "event cancelled");
        Ok(())
    }

    fn validate(&self, action: &Action) -> SimResult<()> {
        match *action {
            Action::Deliver {
                wire,
                source,
                target,
                data,
            } => {
                let w = self.graph.wire(wire)?;
                if !w.is_supplier(source) {
                    return Err(SimError::NotSupplier { pin: source, wire });
                }
                if !w.is_consumer(target) {
                    return Err(SimError::UnregisteredPin { pin: target, wire });
                }
                self.graph.pin(target)?.check_range(data)
            }
            Action::Stimulus { pin, data } => self.graph.pin(pin)?.check_write(data),
        }
    }

    // ----- time -----

    /// Executes every pending event with a timestamp up to `now + diff`,
    /// including events scheduled along the way, then sets the clock to
    /// `now + diff`.
    pub fn advance(&mut self, diff: SimTime) -> SimResult<()> {
        let from = self.now();
        let target = self.scheduler.clock().ahead(diff)?;
        let executed = self.run_forward(target);
        tracing::info!(from, to = target, executed, "advanced");
        Ok(())
    }

    /// Rolls back every executed event with a timestamp after `now - diff`,
    /// newest first, then sets the clock to `now - diff`.
    ///
    /// Fails without changing anything if `diff` exceeds the current time or
    /// if an event that would need undoing is no longer in history.
    pub fn retreat(&mut self, diff: SimTime) -> SimResult<()> {
        let from = self.now();
        let target = self.scheduler.plan_retreat(diff)?;
        let rolled_back = self.run_backward(target);
        tracing::info!(from, to = target, rolled_back, "retreated");
        Ok(())
    }

    /// Moves the clock to `time`, forwards or backwards.
    pub fn jump(&mut self, time: SimTime) -> SimResult<()> {
        let now = self.now();
        tracing::info!(from = now, to = time, "jump");
        if time >= now {
            self.advance(time - now)
        } else {
            self.retreat(now - time)
        }
    }

    fn run_forward(&mut self, target: SimTime) -> usize {
        self.scheduler.begin(SchedulerState::Advancing);
        let mut executed = 0;
        while let Some(mut event) = self.scheduler.pop_due(target) {
            self.scheduler.set_time(event.time);
            self.scheduler.reserve(std::mem::take(&mut event.replay));
            self.execute(&mut event);
            self.scheduler.release();

            tracing::debug!(
                event = %event.id,
                time = event.time,
                target = %event.action.target(),
                data = event.action.data(),
                children = event.journal.children.len(),
                "executed"
            );
            self.observe(TraceKind::Executed, &event);
            self.scheduler.retire(event);
            executed += 1;
        }
        self.scheduler.finish(target);
        executed
    }

    fn run_backward(&mut self, target: SimTime) -> usize {
        self.scheduler.begin(SchedulerState::Retreating);
        let mut rolled_back = 0;
        while let Some(mut event) = self.scheduler.pop_undoable(target) {
            self.scheduler.set_time(event.time);
            self.rollback(&mut event);

            tracing::debug!(
                event = %event.id,
                time = event.time,
                target = %event.action.target(),
                "rolled back"
            );
            self.observe(TraceKind::RolledBack, &event);
            self.scheduler.requeue(event);
            rolled_back += 1;
        }
        self.scheduler.finish(target);
        rolled_back
    }

    fn execute(&mut self, event: &mut ScheduledEvent) {
        let mut journal = Journal::default();
        match event.action {
            Action::Deliver { target, data, .. } => {
                match propagation::apply_delivery(&mut self.graph, target, data) {
                    Ok(change) => {
                        event.prior = Some(change.previous);
                        if change.changed {
                            self.notify(change.owner, Some(target), Some(&mut journal));
                        }
                    }
                    Err(err) => {
                        tracing::warn!(event = %event.id, pin = %target, error = %err, "delivery skipped");
                        self.scheduler.stats_mut().skipped += 1;
                        event.prior = None;
                    }
                }
            }
            Action::Stimulus { pin, data } => {
                if let Err(err) = propagation::write(
                    &mut self.graph,
                    &mut self.scheduler,
                    Some(&mut journal),
                    pin,
                    data,
                ) {
                    tracing::warn!(event = %event.id, pin = %pin, error = %err, "scheduled write failed");
                    self.scheduler.stats_mut().failed_stimuli += 1;
                }
            }
        }
        event.journal = journal;
    }

    fn rollback(&mut self, event: &mut ScheduledEvent) {
        let journal = std::mem::take(&mut event.journal);
        event.replay = propagation::undo_journal(&mut self.graph, &mut self.scheduler, journal);

        if let (Action::Deliver { target, .. }, Some(prior)) = (&event.action, event.prior.take()) {
            let target = *target;
            match propagation::revert_delivery(&mut self.graph, target, prior) {
                Ok(change) if change.changed => self.notify(change.owner, Some(target), None),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(event = %event.id, pin = %target, error = %err, "delivery not reverted");
                }
            }
        }
    }

    fn observe(&mut self, kind: TraceKind, event: &ScheduledEvent) {
        let entry = TraceEntry::new(kind, event);
        self.handlers.dispatch(&entry);
        self.scheduler.record(entry);
    }

    fn notify(&mut self, owner: ComponentId, pin: Option<PinId>, journal: Option<&mut Journal>) {
        let Some(behavior) = self.behaviors.get_mut(&owner) else {
            return;
        };
        self.scheduler.stats_mut().updates += 1;
        let mut ctx = Context::new(&mut self.graph, &mut self.scheduler, owner, journal);
        behavior.update(&mut ctx, pin);
    }

    // ----- handlers -----

    /// Registers `handler` for executed and rolled-back events passing
    /// `filter`.
    ///
    /// Handlers run after the event and its component callbacks, in
    /// subscription order.
    pub fn subscribe(
        &mut self,
        filter: EventFilter,
        handler: impl EventHandler + 'static,
    ) -> HandlerId {
        let id = self.handlers.subscribe(filter, handler);
        tracing::debug!(handler = %id, "handler subscribed");
        id
    }

    /// Removes a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: HandlerId) -> bool {
        self.handlers.unsubscribe(id)
    }

    /// Removes every handler whose filter satisfies `predicate`.
    pub fn unsubscribe_where<P>(&mut self, predicate: P) -> usize
    where
        P: FnMut(&EventFilter) -> bool,
    {
        self.handlers.unsubscribe_where(predicate)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    // ----- inspection -----

    #[inline]
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn pending_count(&self) -> usize {
        self.scheduler.pending_len()
    }

    pub fn history_len(&self) -> usize {
        self.scheduler.history_len()
    }

    pub fn peek_next_time(&self) -> Option<SimTime> {
        self.scheduler.peek_next_time()
    }

    pub fn is_pending(&self, id: EventId) -> bool {
        self.scheduler.is_pending(id)
    }

    pub fn set_keep_history(&mut self, keep: bool) {
        self.scheduler.set_keep_history(keep);
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.scheduler.trace()
    }

    pub fn stats(&self) -> &SchedulerStats {
        self.scheduler.stats()
    }

    /// Exports statistics as JSON.
    pub fn export_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "simulation": {
                "now": self.now(),
                "components": self.graph.component_count(),
                "pins": self.graph.pin_count(),
                "wires": self.graph.wire_count(),
                "pending": self.scheduler.pending_len(),
                "history": self.scheduler.history_len(),
                "keep_history": self.scheduler.keep_history(),
                "history_limit": self.scheduler.history_limit(),
                "horizon": self.scheduler.horizon(),
                "handlers": self.handlers.len(),
            },
            "scheduler": serde_json::to_value(self.scheduler.stats()).unwrap_or_default(),
        })
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{from_fn, Passive};
    use crate::probe::Probe;

    struct Line {
        sim: Simulation,
        out: PinId,
        inp: PinId,
        wire: WireId,
        probe: Probe,
    }

    fn line(delay: SimTime) -> Line {
        let mut sim = Simulation::new().with_trace(true);
        let a = sim.add_component("a", Passive);
        let probe = Probe::new();
        let b = sim.add_component("b", probe.clone());
        let out = sim.add_pin(a, "out", 1, Capability::Writeable).unwrap();
        let inp = sim.add_pin(b, "in", 1, Capability::Readable).unwrap();
        let wire = sim.add_wire("w");
        sim.attach(out, wire, 0).unwrap();
        sim.attach(inp, wire, delay).unwrap();
        Line {
            sim,
            out,
            inp,
            wire,
            probe,
        }
    }

    #[test]
    fn test_simulation_creation() {
        let sim = Simulation::new();
        assert_eq!(sim.now(), 0);
        assert_eq!(sim.state(), SchedulerState::Idle);
        assert_eq!(sim.pending_count(), 0);
        assert!(sim.scheduler().keep_history());
    }

    #[test]
    fn test_advance_delivers_and_notifies() {
        let mut l = line(2);
        l.sim.write(l.out, 1).unwrap();

        l.sim.advance(1).unwrap();
        assert_eq!(l.sim.read(l.inp).unwrap(), 0);
        assert_eq!(l.probe.count(), 0);

        l.sim.advance(1).unwrap();
        assert_eq!(l.sim.read(l.inp).unwrap(), 1);
        assert_eq!(l.probe.count_for(l.inp), 1);
        assert_eq!(l.sim.now(), 2);
        assert_eq!(l.sim.history_len(), 1);
    }

    #[test]
    fn test_retreat_restores_and_notifies() {
        let mut l = line(1);
        l.sim.write(l.out, 1).unwrap();
        l.sim.advance(5).unwrap();

        l.sim.retreat(5).unwrap();
        assert_eq!(l.sim.now(), 0);
        assert_eq!(l.sim.read(l.inp).unwrap(), 0);
        assert_eq!(l.sim.pending_count(), 1);
        assert_eq!(l.probe.count(), 2);
        assert_eq!(
            l.probe.last().map(|o| o.phase),
            Some(SchedulerState::Retreating)
        );
    }

    #[test]
    fn test_schedule_validates_action() {
        let mut l = line(1);
        assert!(matches!(
            l.sim.schedule_write(l.inp, 1, Timing::At(1)),
            Err(SimError::Capability { .. })
        ));
        assert!(matches!(
            l.sim.schedule_write(l.out, 2, Timing::At(1)),
            Err(SimError::Range { .. })
        ));
        assert_eq!(
            l.sim.schedule(Action::deliver(l.wire, l.inp, l.out, 1), Timing::At(1)),
            Err(SimError::NotSupplier {
                pin: l.inp,
                wire: l.wire
            })
        );
        assert_eq!(l.sim.pending_count(), 0);
    }

    #[test]
    fn test_jump_both_directions() {
        let mut l = line(3);
        l.sim.schedule_write(l.out, 1, Timing::At(2)).unwrap();

        l.sim.jump(10).unwrap();
        assert_eq!(l.sim.read(l.inp).unwrap(), 1);
        assert_eq!(l.sim.pin(l.out).unwrap().value(), 1);

        l.sim.jump(4).unwrap();
        assert_eq!(l.sim.read(l.inp).unwrap(), 0);
        assert_eq!(l.sim.pin(l.out).unwrap().value(), 1);

        l.sim.jump(0).unwrap();
        assert_eq!(l.sim.pin(l.out).unwrap().value(), 0);
        assert_eq!(l.sim.pending_count(), 1);
    }

    #[test]
    fn test_refresh_runs_update_without_pin() {
        let mut l = line(0);
        let b = l.sim.pin(l.inp).unwrap().owner();
        l.sim.refresh(b).unwrap();
        assert_eq!(l.probe.last().map(|o| o.pin), Some(None));
        assert_eq!(
            l.sim.refresh(ComponentId::new(42)),
            Err(SimError::UnknownComponent(ComponentId::new(42)))
        );
    }

    #[test]
    fn test_removed_target_is_skipped() {
        let mut l = line(1);
        l.sim.write(l.out, 1).unwrap();
        let b = l.sim.pin(l.inp).unwrap().owner();
        l.sim.remove_component(b).unwrap();

        l.sim.advance(1).unwrap();
        assert_eq!(l.sim.stats().skipped, 1);
        assert_eq!(l.probe.count(), 0);
    }

    #[test]
    fn test_failed_stimulus_is_counted() {
        let mut l = line(1);
        l.sim.schedule_write(l.out, 1, Timing::At(1)).unwrap();
        let a = l.sim.pin(l.out).unwrap().owner();
        l.sim.remove_component(a).unwrap();

        l.sim.advance(2).unwrap();
        assert_eq!(l.sim.stats().failed_stimuli, 1);
        assert_eq!(l.sim.export_stats()["scheduler"]["failed_stimuli"], 1);
        assert_eq!(l.sim.pending_count(), 0);
    }

    #[test]
    fn test_handler_filters_by_kind_and_target() {
        use crate::handler::EventFilter;
        use parking_lot::Mutex;
        use std::sync::Arc;

        let mut l = line(2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        l.sim.subscribe(
            EventFilter::any().kind(TraceKind::RolledBack).target(l.inp),
            move |e: &TraceEntry| log.lock().push((e.time, e.data)),
        );
        let unrelated = l.sim.subscribe(EventFilter::any().target(l.out), |_: &TraceEntry| {});
        assert_eq!(l.sim.handler_count(), 2);

        l.sim.write(l.out, 1).unwrap();
        l.sim.advance(2).unwrap();
        assert!(seen.lock().is_empty());

        l.sim.retreat(2).unwrap();
        assert_eq!(*seen.lock(), vec![(2, 1)]);

        assert!(l.sim.unsubscribe(unrelated));
        assert_eq!(l.sim.unsubscribe_where(|f| f.kinds.contains(&TraceKind::RolledBack)), 1);
        assert_eq!(l.sim.handler_count(), 0);
    }

    #[test]
    fn test_callback_write_is_undone() {
        let mut sim = Simulation::new();
        let src = sim.add_component("src", Passive);
        let inv = sim.add_component(
            "inv",
            from_fn(|ctx, _pin| {
                if let Ok(a) = ctx.read_named("a") {
                    let _ = ctx.write_named("y", a ^ 1);
                }
            }),
        );
        let out = sim.add_pin(src, "out", 1, Capability::Writeable).unwrap();
        let a = sim.add_pin(inv, "a", 1, Capability::Readable).unwrap();
        let y = sim.add_pin(inv, "y", 1, Capability::Writeable).unwrap();
        let w = sim.add_wire("w");
        sim.attach(out, w, 0).unwrap();
        sim.attach(a, w, 1).unwrap();

        sim.write(out, 1).unwrap();
        sim.advance(1).unwrap();
        assert_eq!(sim.pin(y).unwrap().value(), 0);

        sim.write(out, 0).unwrap();
        sim.advance(1).unwrap();
        assert_eq!(sim.pin(y).unwrap().value(), 1);

        sim.retreat(1).unwrap();
        assert_eq!(sim.pin(y).unwrap().value(), 0);
        assert_eq!(sim.read(a).unwrap(), 1);
    }

    #[test]
    fn test_export_stats() {
        let mut l = line(1);
        l.sim.write(l.out, 1).unwrap();
        l.sim.advance(1).unwrap();

        let stats = l.sim.export_stats();
        assert_eq!(stats["simulation"]["now"], 1);
        assert_eq!(stats["simulation"]["components"], 2);
        assert_eq!(stats["scheduler"]["executed"], 1);
        assert_eq!(stats["scheduler"]["updates"], 1);
    }
}
