//! Core type definitions for the simulation core.
//!
//! Every graph element lives in an id-indexed arena owned by the
//! [`Graph`](crate::graph::Graph). Cross references between pins, wires and
//! components are these plain ids, never pointers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical simulation time, in abstract ticks.
///
/// All delays and event timestamps share this unit. Time only moves through
/// the scheduler's `advance`/`retreat`/`jump` operations.
pub type SimTime = u64;

/// A signal value carried by a pin.
///
/// The legal range of a concrete pin is `[0, 2^bandwidth - 1]`.
pub type Data = u64;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw arena index.
            #[inline]
            pub fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw arena index.
            #[inline]
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "#{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Identifier of a component in the graph arena.
    ComponentId,
    "C"
);

arena_id!(
    /// Identifier of a pin in the graph arena.
    PinId,
    "P"
);

arena_id!(
    /// Identifier of a wire in the graph arena.
    WireId,
    "W"
);
