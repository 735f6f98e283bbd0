//! Wires: shared media joining supplier pins to consumer pins.
//!
//! A wire keeps its own per-pin delay table, so one wire can reach different
//! consumers at different latencies. A delay entry exists exactly for the
//! pins currently attached.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{SimError, SimResult};
use crate::pin::Capability;
use crate::types::{PinId, SimTime, WireId};

/// The role(s) a pin holds on a wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Supplier,
    Consumer,
    /// Read-writable pins supply and consume on the same wire.
    Both,
}

impl Role {
    /// The role a pin of the given capability takes when attached.
    pub fn for_capability(capability: Capability) -> Self {
        match capability {
            Capability::Writeable => Role::Supplier,
            Capability::Readable => Role::Consumer,
            Capability::ReadWriteable => Role::Both,
        }
    }

    pub fn supplies(self) -> bool {
        matches!(self, Role::Supplier | Role::Both)
    }

    pub fn consumes(self) -> bool {
        matches!(self, Role::Consumer | Role::Both)
    }
}

/// A shared connection medium.
#[derive(Clone, Debug)]
pub struct Wire {
    id: WireId,
    name: String,
    suppliers: BTreeSet<PinId>,
    consumers: BTreeSet<PinId>,
    delays: BTreeMap<PinId, SimTime>,
}

impl Wire {
    pub(crate) fn new(id: WireId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            suppliers: BTreeSet::new(),
            consumers: BTreeSet::new(),
            delays: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> WireId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name with the wire classifier prefix, e.g. `W_bus`.
    pub fn display_name(&self) -> String {
        format!("W_{}", self.name)
    }

    pub fn is_attached(&self, pin: PinId) -> bool {
        self.delays.contains_key(&pin)
    }

    pub fn is_supplier(&self, pin: PinId) -> bool {
        self.suppliers.contains(&pin)
    }

    pub fn is_consumer(&self, pin: PinId) -> bool {
        self.consumers.contains(&pin)
    }

    pub fn suppliers(&self) -> impl Iterator<Item = PinId> + '_ {
        self.suppliers.iter().copied()
    }

    pub fn consumers(&self) -> impl Iterator<Item = PinId> + '_ {
        self.consumers.iter().copied()
    }

    /// Number of attached pins.
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// Delay recorded for an attached pin.
    pub fn delay(&self, pin: PinId) -> SimResult<SimTime> {
        self.delays
            .get(&pin)
            .copied()
            .ok_or(SimError::UnregisteredPin { pin, wire: self.id })
    }

    /// Role held by an attached pin.
    pub fn role(&self, pin: PinId) -> SimResult<Role> {
        match (self.is_supplier(pin), self.is_consumer(pin)) {
            (true, true) => Ok(Role::Both),
            (true, false) => Ok(Role::Supplier),
            (false, true) => Ok(Role::Consumer),
            (false, false) => Err(SimError::UnregisteredPin { pin, wire: self.id }),
        }
    }

    /// Registers `pin` in the role matching its capability.
    ///
    /// Registering an attached pin again only replaces its delay.
    pub(crate) fn register(&mut self, pin: PinId, capability: Capability, delay: SimTime) {
        let role = Role::for_capability(capability);
        if role.supplies() {
            self.suppliers.insert(pin);
        }
        if role.consumes() {
            self.consumers.insert(pin);
        }
        self.delays.insert(pin, delay);
    }

    /// Removes `pin` from every role. Returns false if it was not attached.
    pub(crate) fn unregister(&mut self, pin: PinId) -> bool {
        self.suppliers.remove(&pin);
        self.consumers.remove(&pin);
        self.delays.remove(&pin).is_some()
    }

    pub(crate) fn set_delay(&mut self, pin: PinId, delay: SimTime) -> SimResult<()> {
        match self.delays.get_mut(&pin) {
            Some(slot) => {
                *slot = delay;
                Ok(())
            }
            None => Err(SimError::UnregisteredPin { pin, wire: self.id }),
        }
    }

    /// Copies the consumer set with delays, leaving out `supplier`.
    ///
    /// Delivery rounds iterate this copy, so topology changes made while a
    /// round is in flight only affect later rounds.
    pub(crate) fn consumer_snapshot(&self, supplier: PinId) -> Vec<(PinId, SimTime)> {
        self.consumers
            .iter()
            .filter(|&&pin| pin != supplier)
            .map(|&pin| (pin, self.delays.get(&pin).copied().unwrap_or(0)))
            .collect()
    }

    /// All attached pins, in id order.
    pub(crate) fn attached(&self) -> Vec<PinId> {
        self.delays.keys().copied().collect()
    }
}
