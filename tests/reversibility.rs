//! Integration tests for time reversal.
//!
//! These tests verify that:
//! - `advance` followed by `retreat` restores every pin and the clock
//! - Replaying after a retreat reproduces the original execution order
//! - Fresh instances fed the same calls produce identical traces
//! - History limits, cancellation and `jump` behave as documented

use std::sync::Arc;

use parking_lot::Mutex;

use logy::component::{from_fn, Passive};
use logy::{
    Capability, Component, Context, EventFilter, PinId, Probe, SchedulerState, SimError,
    Simulation, Timing, TraceEntry, TraceKind,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Four-bit inverter.
fn not4() -> impl Component {
    from_fn(|ctx: &mut Context<'_>, _pin| {
        if let Ok(a) = ctx.read_named("a") {
            let _ = ctx.write_named("y", !a & 0xF);
        }
    })
}

struct Circuit {
    sim: Simulation,
    out: PinId,
    sink: PinId,
    probe: Probe,
}

/// src.out -(2)-> n1 -(3)-> n2 -(1)-> sink, with a delay-5 tap on src.out.
fn circuit(trace: bool) -> Circuit {
    let mut sim = Simulation::new().with_trace(trace);
    let src = sim.add_component("src", Passive);
    let n1 = sim.add_component("n1", not4());
    let n2 = sim.add_component("n2", not4());
    let probe = Probe::new();
    let sink_c = sim.add_component("sink", probe.clone());
    let tap_c = sim.add_component("tap", Passive);

    let out = sim.add_pin(src, "out", 4, Capability::Writeable).unwrap();
    let n1a = sim.add_pin(n1, "a", 4, Capability::Readable).unwrap();
    let n1y = sim.add_pin(n1, "y", 4, Capability::Writeable).unwrap();
    let n2a = sim.add_pin(n2, "a", 4, Capability::Readable).unwrap();
    let n2y = sim.add_pin(n2, "y", 4, Capability::Writeable).unwrap();
    let sink = sim.add_pin(sink_c, "in", 4, Capability::Readable).unwrap();
    let tap = sim.add_pin(tap_c, "in", 4, Capability::Readable).unwrap();

    let w0 = sim.add_wire("w0");
    sim.attach(out, w0, 0).unwrap();
    sim.attach(n1a, w0, 2).unwrap();
    sim.attach(tap, w0, 5).unwrap();
    let w1 = sim.add_wire("w1");
    sim.attach(n1y, w1, 0).unwrap();
    sim.attach(n2a, w1, 3).unwrap();
    let w2 = sim.add_wire("w2");
    sim.attach(n2y, w2, 0).unwrap();
    sim.attach(sink, w2, 1).unwrap();

    for (time, value) in [(1, 5), (4, 12), (6, 3), (9, 0)] {
        sim.schedule_write(out, value, Timing::At(time)).unwrap();
    }

    Circuit {
        sim,
        out,
        sink,
        probe,
    }
}

fn snapshot(sim: &Simulation) -> Vec<(PinId, u64)> {
    sim.graph().pins().map(|p| (p.id(), p.value())).collect()
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_round_trip_restores_every_pin() {
    let mut c = circuit(false);
    let initial = snapshot(&c.sim);
    let initial_pending = c.sim.pending_count();

    c.sim.advance(20).unwrap();
    assert_ne!(snapshot(&c.sim), initial);

    c.sim.retreat(20).unwrap();
    assert_eq!(c.sim.now(), 0);
    assert_eq!(snapshot(&c.sim), initial);
    assert_eq!(c.sim.pin(c.out).unwrap().value(), 0);
    assert_eq!(c.sim.pending_count(), initial_pending);
    assert_eq!(c.sim.history_len(), 0);

    let stats = c.sim.stats();
    assert_eq!(stats.executed, stats.rolled_back);
}

#[test]
fn test_partial_retreat_matches_earlier_state() {
    let mut c = circuit(false);
    c.sim.advance(7).unwrap();
    let at_seven = snapshot(&c.sim);
    c.sim.advance(13).unwrap();
    let at_twenty = snapshot(&c.sim);

    c.sim.jump(7).unwrap();
    assert_eq!(c.sim.now(), 7);
    assert_eq!(snapshot(&c.sim), at_seven);

    c.sim.jump(3).unwrap();
    c.sim.jump(20).unwrap();
    assert_eq!(snapshot(&c.sim), at_twenty);
}

#[test]
fn test_replay_after_retreat_is_identical() {
    let mut c = circuit(true);
    c.sim.advance(20).unwrap();
    let first = c.sim.trace().unwrap().executed_ids();
    let after_first = snapshot(&c.sim);

    c.sim.retreat(20).unwrap();
    c.sim.advance(20).unwrap();

    let all = c.sim.trace().unwrap().executed_ids();
    assert_eq!(all.len(), first.len() * 2);
    assert_eq!(&all[first.len()..], first.as_slice());
    assert_eq!(snapshot(&c.sim), after_first);
}

#[test]
fn test_fresh_instances_are_deterministic() {
    let run = || {
        let mut c = circuit(true);
        c.sim.advance(8).unwrap();
        c.sim.retreat(5).unwrap();
        c.sim.advance(12).unwrap();
        (snapshot(&c.sim), c.sim.trace().cloned())
    };

    let (values_a, trace_a) = run();
    let (values_b, trace_b) = run();
    assert_eq!(values_a, values_b);
    assert_eq!(trace_a, trace_b);
    assert!(trace_a.is_some_and(|t| !t.is_empty()));
}

#[test]
fn test_rollback_notifies_with_restored_value() {
    let mut c = circuit(false);
    c.sim.advance(20).unwrap();
    let forward = c.probe.count();
    assert!(forward > 0);

    c.sim.retreat(20).unwrap();
    let backward: Vec<_> = c
        .probe
        .observations()
        .into_iter()
        .skip(forward)
        .collect();
    assert_eq!(backward.len(), forward);
    assert!(backward.iter().all(|o| o.phase == SchedulerState::Retreating));
    assert_eq!(backward.last().and_then(|o| o.value), Some(0));
    assert_eq!(c.sim.read(c.sink).unwrap(), 0);
}

#[test]
fn test_rollback_withdraws_pending_children() {
    let mut sim = Simulation::new();
    let a = sim.add_component("a", Passive);
    let b = sim.add_component("b", Passive);
    let out = sim.add_pin(a, "out", 1, Capability::Writeable).unwrap();
    let inp = sim.add_pin(b, "in", 1, Capability::Readable).unwrap();
    let w = sim.add_wire("w");
    sim.attach(out, w, 0).unwrap();
    sim.attach(inp, w, 10).unwrap();

    let stim = sim.schedule_write(out, 1, Timing::At(1)).unwrap();
    sim.advance(2).unwrap();
    assert_eq!(sim.pending_count(), 1);
    assert_eq!(sim.peek_next_time(), Some(11));

    sim.retreat(2).unwrap();
    assert_eq!(sim.pending_count(), 1);
    assert!(sim.is_pending(stim));
    assert_eq!(sim.pin(out).unwrap().value(), 0);
    assert_eq!(sim.stats().withdrawn, 1);
}

#[test]
fn test_driver_writes_are_not_undone() {
    let mut sim = Simulation::new();
    let a = sim.add_component("a", Passive);
    let b = sim.add_component("b", Passive);
    let out = sim.add_pin(a, "out", 1, Capability::Writeable).unwrap();
    let inp = sim.add_pin(b, "in", 1, Capability::Readable).unwrap();
    let w = sim.add_wire("w");
    sim.attach(out, w, 0).unwrap();
    sim.attach(inp, w, 1).unwrap();

    sim.write(out, 1).unwrap();
    sim.advance(2).unwrap();
    sim.retreat(2).unwrap();

    assert_eq!(sim.pin(out).unwrap().value(), 1);
    assert_eq!(sim.read(inp).unwrap(), 0);

    sim.advance(2).unwrap();
    assert_eq!(sim.read(inp).unwrap(), 1);
}

#[test]
fn test_filtered_handlers_see_only_matching_events() {
    let mut c = circuit(true);

    let sink_events = Arc::new(Mutex::new(Vec::new()));
    let log = sink_events.clone();
    let sink_handler = c.sim.subscribe(
        EventFilter::any().target(c.sink),
        move |e: &TraceEntry| log.lock().push((e.kind, e.time, e.data)),
    );
    let undone_from_src = Arc::new(Mutex::new(0usize));
    let count = undone_from_src.clone();
    c.sim.subscribe(
        EventFilter::any().kind(TraceKind::RolledBack).source(c.out),
        move |_: &TraceEntry| *count.lock() += 1,
    );

    c.sim.advance(20).unwrap();
    c.sim.retreat(20).unwrap();

    let entries = c.sim.trace().unwrap().entries().to_vec();
    let expected: Vec<_> = entries
        .iter()
        .filter(|e| e.target == c.sink)
        .map(|e| (e.kind, e.time, e.data))
        .collect();
    assert!(expected.iter().any(|e| e.0 == TraceKind::Executed));
    assert!(expected.iter().any(|e| e.0 == TraceKind::RolledBack));
    assert_eq!(*sink_events.lock(), expected);

    let rolled_back_from_src = entries
        .iter()
        .filter(|e| e.kind == TraceKind::RolledBack && e.source == Some(c.out))
        .count();
    assert!(rolled_back_from_src > 0);
    assert_eq!(*undone_from_src.lock(), rolled_back_from_src);

    assert!(c.sim.unsubscribe(sink_handler));
    c.sim.advance(20).unwrap();
    assert_eq!(sink_events.lock().len(), expected.len());
}

// ============================================================================
// History bounds
// ============================================================================

#[test]
fn test_history_disabled_blocks_retreat() {
    let mut c = circuit(false);
    c.sim.set_keep_history(false);
    c.sim.advance(5).unwrap();
    let before = snapshot(&c.sim);

    assert!(matches!(
        c.sim.retreat(1),
        Err(SimError::HistoryUnavailable { .. })
    ));
    assert_eq!(c.sim.retreat(0), Ok(()));
    assert_eq!(c.sim.now(), 5);
    assert_eq!(snapshot(&c.sim), before);
    assert_eq!(c.sim.history_len(), 0);
}

#[test]
fn test_history_limit_sets_horizon() {
    let mut sim = Simulation::new().with_history_limit(Some(2));
    let a = sim.add_component("a", Passive);
    let p = sim.add_pin(a, "p", 2, Capability::ReadWriteable).unwrap();
    for t in 1..=3 {
        sim.schedule_write(p, t, Timing::At(t)).unwrap();
    }
    sim.advance(5).unwrap();
    assert_eq!(sim.history_len(), 2);
    assert_eq!(sim.scheduler().horizon(), Some(1));

    sim.retreat(3).unwrap();
    assert_eq!(sim.read(p).unwrap(), 2);
    sim.retreat(1).unwrap();
    assert_eq!(sim.read(p).unwrap(), 1);

    assert_eq!(
        sim.retreat(1),
        Err(SimError::HistoryUnavailable {
            horizon: 1,
            target: 0
        })
    );
    assert_eq!(sim.now(), 1);
    assert_eq!(sim.read(p).unwrap(), 1);
}

#[test]
fn test_retreat_underflow() {
    let mut c = circuit(false);
    c.sim.advance(3).unwrap();
    assert_eq!(
        c.sim.retreat(4),
        Err(SimError::Underflow {
            current: 3,
            diff: 4
        })
    );
    assert_eq!(c.sim.now(), 3);
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_cancel_lifecycle() {
    let mut sim = Simulation::new();
    let a = sim.add_component("a", Passive);
    let p = sim.add_pin(a, "p", 1, Capability::ReadWriteable).unwrap();

    let late = sim.schedule_write(p, 1, Timing::After(5)).unwrap();
    assert_eq!(sim.cancel(late), Ok(()));
    assert_eq!(sim.cancel(late), Err(SimError::UnknownEvent(late)));
    sim.advance(10).unwrap();
    assert_eq!(sim.read(p).unwrap(), 0);

    let early = sim.schedule_write(p, 1, Timing::After(2)).unwrap();
    sim.advance(3).unwrap();
    assert_eq!(sim.cancel(early), Err(SimError::AlreadyExecuted(early)));

    sim.retreat(3).unwrap();
    assert!(sim.is_pending(early));
    assert_eq!(sim.cancel(early), Ok(()));
    sim.advance(3).unwrap();
    assert_eq!(sim.read(p).unwrap(), 0);
    assert_eq!(sim.stats().cancelled, 2);
}
