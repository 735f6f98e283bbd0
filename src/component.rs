//! Component behaviours and the `Component` trait.
//!
//! A component is the behaviour behind a named node of the signal graph.
//! Whenever one of its pins changes value the engine calls
//! [`Component::update`] with a [`Context`] through which the component can
//! read and write pins and rewire itself.

use crate::error::SimResult;
use crate::event::Journal;
use crate::graph::Graph;
use crate::propagation;
use crate::scheduler::{Scheduler, SchedulerState};
use crate::types::{ComponentId, Data, PinId, SimTime, WireId};

/// The callback every concrete component kind implements.
///
/// `pin` is the pin whose value changed, or `None` when the engine asks the
/// component to re-evaluate without a specific trigger (see
/// [`Simulation::refresh`](crate::engine::Simulation::refresh)).
///
/// The callback also runs while the scheduler is retreating, after a pin
/// was restored to an earlier value. A component whose outputs are a pure
/// function of its inputs needs no special handling for that case.
pub trait Component: Send {
    fn update(&mut self, ctx: &mut Context<'_>, pin: Option<PinId>);
}

/// Component with no behaviour. Useful for pure sources and sinks.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passive;

impl Component for Passive {
    fn update(&mut self, _ctx: &mut Context<'_>, _pin: Option<PinId>) {}
}

/// A component backed by a closure. Created with [`from_fn`].
pub struct FnComponent<F> {
    f: F,
}

impl<F> Component for FnComponent<F>
where
    F: FnMut(&mut Context<'_>, Option<PinId>) + Send,
{
    fn update(&mut self, ctx: &mut Context<'_>, pin: Option<PinId>) {
        (self.f)(ctx, pin)
    }
}

/// Wraps a closure as a component.
///
/// ```rust
/// use logy::{component, Capability, Simulation};
///
/// let mut sim = Simulation::new();
/// let not = sim.add_component(
///     "not",
///     component::from_fn(|ctx, _pin| {
///         let a = ctx.read_named("a").unwrap_or(0);
///         let _ = ctx.write_named("y", a ^ 1);
///     }),
/// );
/// sim.add_pin(not, "a", 1, Capability::Readable).unwrap();
/// sim.add_pin(not, "y", 1, Capability::Writeable).unwrap();
/// ```
pub fn from_fn<F>(f: F) -> FnComponent<F>
where
    F: FnMut(&mut Context<'_>, Option<PinId>) + Send,
{
    FnComponent { f }
}

/// The view of the simulation handed to [`Component::update`].
pub struct Context<'a> {
    graph: &'a mut Graph,
    scheduler: &'a mut Scheduler,
    component: ComponentId,
    journal: Option<&'a mut Journal>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        graph: &'a mut Graph,
        scheduler: &'a mut Scheduler,
        component: ComponentId,
        journal: Option<&'a mut Journal>,
    ) -> Self {
        Self {
            graph,
            scheduler,
            component,
            journal,
        }
    }

    /// The component being updated.
    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    /// Whether the callback runs during an advance or a retreat.
    pub fn phase(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn graph(&self) -> &Graph {
        &*self.graph
    }

    /// Looks up one of this component's pins by local name.
    pub fn pin(&self, name: &str) -> SimResult<PinId> {
        self.graph.pin_by_name(self.component, name)
    }

    pub fn read(&self, pin: PinId) -> SimResult<Data> {
        self.graph.read(pin)
    }

    pub fn read_named(&self, name: &str) -> SimResult<Data> {
        self.read(self.pin(name)?)
    }

    /// Writes a pin and propagates the change.
    ///
    /// Writes made while advancing are journaled against the event being
    /// executed and are undone with it. While retreating the write is only
    /// validated: pin values are restored from the journal of the event
    /// being rolled back.
    pub fn write(&mut self, pin: PinId, data: Data) -> SimResult<()> {
        if self.phase() == SchedulerState::Retreating {
            return self.graph.pin(pin)?.check_write(data);
        }
        propagation::write(
            self.graph,
            self.scheduler,
            self.journal.as_deref_mut(),
            pin,
            data,
        )
    }

    pub fn write_named(&mut self, name: &str, data: Data) -> SimResult<()> {
        let pin = self.pin(name)?;
        self.write(pin, data)
    }

    /// Attaches a pin to a wire. Topology changes are not undone by retreat.
    pub fn attach(&mut self, pin: PinId, wire: WireId, delay: SimTime) -> SimResult<()> {
        self.graph.attach(pin, wire, delay)
    }

    pub fn detach(&mut self, pin: PinId, wire: WireId) -> SimResult<bool> {
        self.graph.detach(pin, wire)
    }
}
