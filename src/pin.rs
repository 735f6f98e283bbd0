//! Pins: capability-tagged connection points owned by a component.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{SimError, SimResult};
use crate::types::{ComponentId, Data, PinId, WireId};

/// Widest supported pin, in bits.
pub const MAX_BANDWIDTH: u32 = 64;

/// What a pin may be used for.
///
/// The capability also decides the role a pin takes on when attached to a
/// wire: writable pins supply, readable pins consume, and read-writable
/// pins do both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    Readable,
    Writeable,
    ReadWriteable,
}

impl Capability {
    /// Returns true if `read` is allowed.
    pub fn can_read(self) -> bool {
        matches!(self, Capability::Readable | Capability::ReadWriteable)
    }

    /// Returns true if `write` is allowed.
    pub fn can_write(self) -> bool {
        matches!(self, Capability::Writeable | Capability::ReadWriteable)
    }
}

/// Largest value a pin of the given width can hold.
pub fn max_value(bandwidth: u32) -> Data {
    if bandwidth >= MAX_BANDWIDTH {
        Data::MAX
    } else {
        (1u64 << bandwidth) - 1
    }
}

/// A typed connection point belonging to exactly one component.
///
/// The cached value always satisfies `value <= max_value(bandwidth)`.
#[derive(Clone, Debug)]
pub struct Pin {
    id: PinId,
    name: String,
    owner: ComponentId,
    bandwidth: u32,
    capability: Capability,
    value: Data,
    wires: BTreeSet<WireId>,
}

impl Pin {
    pub(crate) fn new(
        id: PinId,
        owner: ComponentId,
        name: impl Into<String>,
        bandwidth: u32,
        capability: Capability,
    ) -> SimResult<Self> {
        if bandwidth == 0 || bandwidth > MAX_BANDWIDTH {
            return Err(SimError::InvalidBandwidth(bandwidth));
        }
        Ok(Self {
            id,
            name: name.into(),
            owner,
            bandwidth,
            capability,
            value: 0,
            wires: BTreeSet::new(),
        })
    }

    pub fn id(&self) -> PinId {
        self.id
    }

    /// Local identifier of the pin within its component.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name with the pin classifier prefix, e.g. `P_out`.
    pub fn display_name(&self) -> String {
        format!("P_{}", self.name)
    }

    /// The component this pin belongs to.
    pub fn owner(&self) -> ComponentId {
        self.owner
    }

    pub fn bandwidth(&self) -> u32 {
        self.bandwidth
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// The cached value, regardless of capability.
    ///
    /// Drivers and tests use this to inspect output pins; components should
    /// go through `read`, which enforces the capability.
    pub fn value(&self) -> Data {
        self.value
    }

    pub fn max_value(&self) -> Data {
        max_value(self.bandwidth)
    }

    /// Wires this pin is attached to, in id order.
    pub fn wires(&self) -> impl Iterator<Item = WireId> + '_ {
        self.wires.iter().copied()
    }

    pub fn is_attached(&self, wire: WireId) -> bool {
        self.wires.contains(&wire)
    }

    pub(crate) fn check_read(&self) -> SimResult<()> {
        if self.capability.can_read() {
            Ok(())
        } else {
            Err(SimError::Capability {
                pin: self.id,
                operation: "read",
            })
        }
    }

    /// Validates a write without applying it.
    pub(crate) fn check_write(&self, data: Data) -> SimResult<()> {
        if !self.capability.can_write() {
            return Err(SimError::Capability {
                pin: self.id,
                operation: "write",
            });
        }
        self.check_range(data)
    }

    pub(crate) fn check_range(&self, data: Data) -> SimResult<()> {
        let max = self.max_value();
        if data > max {
            return Err(SimError::Range {
                pin: self.id,
                value: data,
                max,
            });
        }
        Ok(())
    }

    /// Stores `data` and returns the previous value.
    pub(crate) fn replace(&mut self, data: Data) -> SimResult<Data> {
        self.check_range(data)?;
        Ok(std::mem::replace(&mut self.value, data))
    }

    pub(crate) fn link(&mut self, wire: WireId) {
        self.wires.insert(wire);
    }

    pub(crate) fn unlink(&mut self, wire: WireId) -> bool {
        self.wires.remove(&wire)
    }
}
