//! The signal graph: components, pins and wires in id-indexed arenas.
//!
//! The graph owns every element. Pins point back at their component and at
//! their wires by id, and wires point at their pins by id, so there are no
//! ownership cycles. Removing an element detaches it everywhere before it
//! leaves the arena; afterwards lookups fail with an `Unknown*` error
//! instead of reaching stale data.
//!
//! All registries are ordered maps. Iteration order is therefore a pure
//! function of the ids, which keeps delivery order reproducible.

use std::collections::BTreeMap;

use crate::error::{SimError, SimResult};
use crate::pin::{Capability, Pin};
use crate::types::{ComponentId, Data, PinId, SimTime, WireId};
use crate::wire::{Role, Wire};

/// Static description of a component: its identity and named pins.
///
/// The behaviour of a component lives outside the graph, see
/// [`Component`](crate::component::Component).
#[derive(Clone, Debug)]
pub struct ComponentNode {
    id: ComponentId,
    name: String,
    pins: BTreeMap<String, PinId>,
}

impl ComponentNode {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name with the component classifier prefix, e.g. `C_adder`.
    pub fn display_name(&self) -> String {
        format!("C_{}", self.name)
    }

    /// Looks up a pin by its local identifier.
    pub fn pin(&self, name: &str) -> Option<PinId> {
        self.pins.get(name).copied()
    }

    /// `(local name, pin)` pairs in name order.
    pub fn pins(&self) -> impl Iterator<Item = (&str, PinId)> {
        self.pins.iter().map(|(name, &id)| (name.as_str(), id))
    }
}

/// Arena of components, pins and wires.
#[derive(Debug, Default)]
pub struct Graph {
    components: BTreeMap<ComponentId, ComponentNode>,
    pins: BTreeMap<PinId, Pin>,
    wires: BTreeMap<WireId, Wire>,
    next_component: u64,
    next_pin: u64,
    next_wire: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new component with no pins.
    pub fn add_component(&mut self, name: impl Into<String>) -> ComponentId {
        let id = ComponentId::new(self.next_component);
        self.next_component += 1;
        self.components.insert(
            id,
            ComponentNode {
                id,
                name: name.into(),
                pins: BTreeMap::new(),
            },
        );
        id
    }

    /// Adds a pin to `component` under a local name.
    pub fn add_pin(
        &mut self,
        component: ComponentId,
        name: impl Into<String>,
        bandwidth: u32,
        capability: Capability,
    ) -> SimResult<PinId> {
        let name = name.into();
        let node = self
            .components
            .get(&component)
            .ok_or(SimError::UnknownComponent(component))?;
        if node.pins.contains_key(&name) {
            return Err(SimError::DuplicatePin { component, name });
        }

        let id = PinId::new(self.next_pin);
        let pin = Pin::new(id, component, name.clone(), bandwidth, capability)?;
        self.next_pin += 1;
        self.pins.insert(id, pin);
        if let Some(node) = self.components.get_mut(&component) {
            node.pins.insert(name, id);
        }
        Ok(id)
    }

    /// Registers a new, unconnected wire.
    pub fn add_wire(&mut self, name: impl Into<String>) -> WireId {
        let id = WireId::new(self.next_wire);
        self.next_wire += 1;
        self.wires.insert(id, Wire::new(id, name));
        id
    }

    pub fn component(&self, id: ComponentId) -> SimResult<&ComponentNode> {
        self.components
            .get(&id)
            .ok_or(SimError::UnknownComponent(id))
    }

    pub fn pin(&self, id: PinId) -> SimResult<&Pin> {
        self.pins.get(&id).ok_or(SimError::UnknownPin(id))
    }

    pub(crate) fn pin_mut(&mut self, id: PinId) -> SimResult<&mut Pin> {
        self.pins.get_mut(&id).ok_or(SimError::UnknownPin(id))
    }

    pub fn wire(&self, id: WireId) -> SimResult<&Wire> {
        self.wires.get(&id).ok_or(SimError::UnknownWire(id))
    }

    pub fn pin_by_name(&self, component: ComponentId, name: &str) -> SimResult<PinId> {
        self.component(component)?
            .pin(name)
            .ok_or_else(|| SimError::UnknownPinName {
                component,
                name: name.to_string(),
            })
    }

    pub fn components(&self) -> impl Iterator<Item = &ComponentNode> {
        self.components.values()
    }

    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.pins.values()
    }

    pub fn wires(&self) -> impl Iterator<Item = &Wire> {
        self.wires.values()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    /// Attaches `pin` to `wire` with the given delay.
    ///
    /// The role follows the pin's capability. Attaching an attached pin
    /// again just updates its delay.
    pub fn attach(&mut self, pin: PinId, wire: WireId, delay: SimTime) -> SimResult<()> {
        let capability = self.pin(pin)?.capability();
        let w = self.wires.get_mut(&wire).ok_or(SimError::UnknownWire(wire))?;
        w.register(pin, capability, delay);
        self.pin_mut(pin)?.link(wire);
        Ok(())
    }

    /// Detaches `pin` from `wire`. Returns false if it was not attached.
    pub fn detach(&mut self, pin: PinId, wire: WireId) -> SimResult<bool> {
        self.pin(pin)?;
        let w = self.wires.get_mut(&wire).ok_or(SimError::UnknownWire(wire))?;
        let was_attached = w.unregister(pin);
        self.pin_mut(pin)?.unlink(wire);
        Ok(was_attached)
    }

    /// Changes the delay of an existing attachment.
    pub fn set_delay(&mut self, pin: PinId, wire: WireId, delay: SimTime) -> SimResult<()> {
        self.wires
            .get_mut(&wire)
            .ok_or(SimError::UnknownWire(wire))?
            .set_delay(pin, delay)
    }

    pub fn delay(&self, pin: PinId, wire: WireId) -> SimResult<SimTime> {
        self.wire(wire)?.delay(pin)
    }

    pub fn role(&self, pin: PinId, wire: WireId) -> SimResult<Role> {
        self.wire(wire)?.role(pin)
    }

    /// Reads a readable pin's cached value.
    pub fn read(&self, pin: PinId) -> SimResult<Data> {
        let p = self.pin(pin)?;
        p.check_read()?;
        Ok(p.value())
    }

    /// Detaches every pin from `wire` and drops it.
    pub fn remove_wire(&mut self, wire: WireId) -> SimResult<()> {
        let w = self.wires.remove(&wire).ok_or(SimError::UnknownWire(wire))?;
        for pin in w.attached() {
            if let Some(p) = self.pins.get_mut(&pin) {
                p.unlink(wire);
            }
        }
        Ok(())
    }

    /// Detaches and drops every pin of `component`, then the component.
    ///
    /// Returns the ids of the removed pins.
    pub fn remove_component(&mut self, component: ComponentId) -> SimResult<Vec<PinId>> {
        let node = self
            .components
            .remove(&component)
            .ok_or(SimError::UnknownComponent(component))?;

        let mut removed = Vec::with_capacity(node.pins.len());
        for pin in node.pins.into_values() {
            if let Some(p) = self.pins.remove(&pin) {
                for wire in p.wires() {
                    if let Some(w) = self.wires.get_mut(&wire) {
                        w.unregister(pin);
                    }
                }
            }
            removed.push(pin);
        }
        Ok(removed)
    }
}
