//! Recording component for tests and demos.
//!
//! A `Probe` logs every `update` it receives. Clones share one log, so a
//! test keeps a clone and hands the other to the simulation.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

use crate::component::{Component, Context};
use crate::scheduler::SchedulerState;
use crate::types::{Data, PinId, SimTime};

/// One recorded `update` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub time: SimTime,
    pub pin: Option<PinId>,
    /// Value of `pin` when the callback ran
    pub value: Option<Data>,
    pub phase: SchedulerState,
}

#[derive(Clone, Debug, Default)]
pub struct Probe {
    log: Arc<Mutex<Vec<Observation>>>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.log.lock().clone()
    }

    /// Number of updates received.
    pub fn count(&self) -> usize {
        self.log.lock().len()
    }

    /// Number of updates triggered by `pin`.
    pub fn count_for(&self, pin: PinId) -> usize {
        self.log.lock().iter().filter(|o| o.pin == Some(pin)).count()
    }

    pub fn last(&self) -> Option<Observation> {
        self.log.lock().last().copied()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

impl Component for Probe {
    fn update(&mut self, ctx: &mut Context<'_>, pin: Option<PinId>) {
        let value = pin.and_then(|p| ctx.graph().pin(p).ok().map(|p| p.value()));
        self.log.lock().push(Observation {
            time: ctx.now(),
            pin,
            value,
            phase: ctx.phase(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Journal;
    use crate::graph::Graph;
    use crate::pin::Capability;
    use crate::scheduler::Scheduler;

    #[test]
    fn test_clones_share_log() {
        let mut graph = Graph::new();
        let c = graph.add_component("probe");
        let p = graph.add_pin(c, "in", 2, Capability::Readable).unwrap();
        let mut sched = Scheduler::new();
        let mut journal = Journal::default();

        let probe = Probe::new();
        let mut inner = probe.clone();
        let mut ctx = Context::new(&mut graph, &mut sched, c, Some(&mut journal));
        inner.update(&mut ctx, Some(p));
        inner.update(&mut ctx, None);

        assert_eq!(probe.count(), 2);
        assert_eq!(probe.count_for(p), 1);
        assert_eq!(
            probe.observations()[0],
            Observation {
                time: 0,
                pin: Some(p),
                value: Some(0),
                phase: SchedulerState::Idle,
            }
        );
        assert_eq!(probe.last().map(|o| o.pin), Some(None));

        probe.clear();
        assert_eq!(probe.count(), 0);
    }
}
