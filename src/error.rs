//! Error types for the simulation core.
//!
//! Every fallible operation returns [`SimResult`]. Operations validate all
//! of their inputs before touching the graph or the queue, so an `Err`
//! always means nothing was mutated.

use thiserror::Error;

use crate::event::EventId;
use crate::types::{ComponentId, Data, PinId, SimTime, WireId};

/// Errors raised by the signal graph, the propagation engine and the
/// scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    // Graph errors
    #[error("pin {pin} does not support {operation}")]
    Capability { pin: PinId, operation: &'static str },

    #[error("value {value} is out of range for pin {pin} (max {max})")]
    Range { pin: PinId, value: Data, max: Data },

    #[error("pin {pin} is not attached to wire {wire}")]
    UnregisteredPin { pin: PinId, wire: WireId },

    #[error("pin {pin} is not a supplier of wire {wire}")]
    NotSupplier { pin: PinId, wire: WireId },

    #[error("bandwidth {0} is outside 1..=64")]
    InvalidBandwidth(u32),

    #[error("component {component} already has a pin named '{name}'")]
    DuplicatePin { component: ComponentId, name: String },

    #[error("pin {0} not found")]
    UnknownPin(PinId),

    #[error("pin '{name}' not found on component {component}")]
    UnknownPinName { component: ComponentId, name: String },

    #[error("wire {0} not found")]
    UnknownWire(WireId),

    #[error("component {0} not found")]
    UnknownComponent(ComponentId),

    // Scheduling errors
    #[error("cannot retreat {diff} ticks from T={current}")]
    Underflow { current: SimTime, diff: SimTime },

    #[error("simulation time overflow")]
    Overflow,

    #[error("history before T={horizon} is no longer available (target T={target})")]
    HistoryUnavailable { horizon: SimTime, target: SimTime },

    #[error("cannot schedule event at T={requested} when current time is T={current}")]
    NonCausal { requested: SimTime, current: SimTime },

    #[error("event {0} has already executed")]
    AlreadyExecuted(EventId),

    #[error("event {0} is not pending")]
    UnknownEvent(EventId),
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;
