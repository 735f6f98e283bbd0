//! Propagation engine.
//!
//! A value change on a supplier pin becomes one delivery event per consumer
//! of every wire the pin supplies, each timestamped `now + delay` for that
//! consumer. Deliveries are applied and reverted here; invoking component
//! callbacks is left to the engine, which owns the behaviours.

use crate::error::{SimError, SimResult};
use crate::event::{Action, EventId, Journal};
use crate::graph::Graph;
use crate::scheduler::Scheduler;
use crate::types::{ComponentId, Data, PinId, SimTime, WireId};

/// Computes the deliveries for one supply round without scheduling them.
///
/// The consumer set is copied up front; the supplier itself is skipped when
/// it also consumes from the wire. Fails with `Range` if `data` does not fit
/// a consumer narrower than the supplier.
pub(crate) fn plan_supply(
    graph: &Graph,
    now: SimTime,
    wire: WireId,
    supplier: PinId,
    data: Data,
) -> SimResult<Vec<(SimTime, Action)>> {
    let w = graph.wire(wire)?;
    if !w.is_supplier(supplier) {
        return Err(SimError::NotSupplier {
            pin: supplier,
            wire,
        });
    }

    w.consumer_snapshot(supplier)
        .into_iter()
        .map(|(consumer, delay)| {
            graph.pin(consumer)?.check_range(data)?;
            let at = now.checked_add(delay).ok_or(SimError::Overflow)?;
            Ok((at, Action::deliver(wire, supplier, consumer, data)))
        })
        .collect()
}

fn enqueue(
    scheduler: &mut Scheduler,
    mut journal: Option<&mut Journal>,
    planned: Vec<(SimTime, Action)>,
) -> Vec<EventId> {
    planned
        .into_iter()
        .map(|(time, action)| {
            tracing::trace!(time, target = %action.target(), data = action.data(), "delivery scheduled");
            let id = scheduler.insert(time, action);
            if let Some(journal) = journal.as_deref_mut() {
                journal.record_child(id);
            }
            id
        })
        .collect()
}

/// Schedules delivery of `data` from `supplier` to every consumer of `wire`.
///
/// Returns the handles of the scheduled deliveries, in consumer id order.
pub fn supply(
    graph: &Graph,
    scheduler: &mut Scheduler,
    journal: Option<&mut Journal>,
    wire: WireId,
    supplier: PinId,
    data: Data,
) -> SimResult<Vec<EventId>> {
    let planned = plan_supply(graph, scheduler.now(), wire, supplier, data)?;
    Ok(enqueue(scheduler, journal, planned))
}

/// Writes `data` to a writable pin and propagates it if it changed.
///
/// Capability and range are checked, and every delivery is planned, before
/// the pin or the queue is touched. When a journal is given, the previous
/// value and the scheduled deliveries are recorded in it.
pub fn write(
    graph: &mut Graph,
    scheduler: &mut Scheduler,
    mut journal: Option<&mut Journal>,
    pin: PinId,
    data: Data,
) -> SimResult<()> {
    let p = graph.pin(pin)?;
    p.check_write(data)?;
    if p.value() == data {
        return Ok(());
    }
    let wires: Vec<WireId> = p.wires().collect();

    let now = scheduler.now();
    let mut planned = Vec::new();
    for wire in wires {
        planned.extend(plan_supply(graph, now, wire, pin, data)?);
    }

    let previous = graph.pin_mut(pin)?.replace(data)?;
    if let Some(journal) = journal.as_deref_mut() {
        journal.record_write(pin, previous);
    }
    enqueue(scheduler, journal, planned);
    Ok(())
}

/// Result of applying or reverting a delivery on its target pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PinChange {
    pub owner: ComponentId,
    pub previous: Data,
    pub changed: bool,
}

/// Stores a delivered value on its target pin.
///
/// Fails with `UnknownPin` if the pin was removed since the delivery was
/// scheduled.
pub(crate) fn apply_delivery(graph: &mut Graph, target: PinId, data: Data) -> SimResult<PinChange> {
    let pin = graph.pin_mut(target)?;
    let previous = pin.replace(data)?;
    Ok(PinChange {
        owner: pin.owner(),
        previous,
        changed: previous != data,
    })
}

/// Restores the value a delivery overwrote.
pub(crate) fn revert_delivery(graph: &mut Graph, target: PinId, prior: Data) -> SimResult<PinChange> {
    apply_delivery(graph, target, prior)
}

/// Undoes the side effects recorded in `journal`.
///
/// Pending children are withdrawn and journaled pin writes are reverted in
/// reverse order. Returns the child ids in their original order so that a
/// re-execution can issue them again.
pub(crate) fn undo_journal(
    graph: &mut Graph,
    scheduler: &mut Scheduler,
    journal: Journal,
) -> Vec<EventId> {
    for &child in journal.children.iter().rev() {
        scheduler.withdraw(child);
    }
    for &(pin, previous) in journal.writes.iter().rev() {
        if let Err(err) = graph.pin_mut(pin).and_then(|p| p.replace(previous)) {
            tracing::warn!(pin = %pin, error = %err, "journaled write not restored");
        }
    }
    journal
        .children
        .into_iter()
        .filter(|&child| scheduler.is_withdrawn(child))
        .collect()
}
