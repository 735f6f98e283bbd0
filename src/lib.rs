//! # Logy
//!
//! A reversible signal propagation core for digital circuit simulation.
//!
//! Components expose bounded-width pins. Pins are attached to wires, and a
//! value written to a supplier pin reaches every consumer of the wire after
//! that consumer's own delay. All changes run through a discrete event
//! scheduler that can move time forward and, using the history of executed
//! events, backward again.
//!
//! ## Design Principles
//!
//! - **Arena graph**: components, pins and wires live in id-indexed maps
//!   owned by the [`Graph`]; cross references are ids.
//! - **Reversible events**: each executed event remembers what it changed,
//!   including writes made by component callbacks, so `retreat` restores
//!   the exact earlier state.
//! - **Deterministic**: events are ordered by `(timestamp, sequence)` and
//!   all graph iteration uses ordered collections. Identical call sequences
//!   produce identical traces.
//!
//! ## Features
//!
//! - `parallel` - Drive independent simulations concurrently using rayon
//!
//! ## Quick Start
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
//! let wire = sim.add_wire("net");
//! sim.attach(out, wire, 0).unwrap();
//! sim.attach(inp, wire, 2).unwrap();
//!
//! sim.write(out, 1).unwrap();
//! sim.advance(1).unwrap();
//! assert_eq!(sim.read(inp).unwrap(), 0);
//! sim.advance(1).unwrap();
//! assert_eq!(sim.read(inp).unwrap(), 1);
//! assert_eq!(probe.count_for(inp), 1);
//!
//! let stats = sim.export_stats();
//! println!("Executed: {}", stats["scheduler"]["executed"]);
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use logy::{SimConfig, Simulation};
//!
//! let config = SimConfig::from_file("simulation.yaml")?;
//! logy::init_logging(&config.simulation.log_level);
//! let mut sim = Simulation::from_config(&config);
//! ```

pub mod types;
pub mod error;
pub mod pin;
pub mod wire;
pub mod graph;
pub mod clock;
pub mod event;
pub mod scheduler;
pub mod propagation;
pub mod component;
pub mod engine;
pub mod config;
pub mod stats;
pub mod trace;
pub mod handler;
pub mod probe;
pub mod parallel;

// Re-export commonly used types
pub use types::{ComponentId, Data, PinId, SimTime, WireId};
pub use error::{SimError, SimResult};
pub use pin::{Capability, Pin, MAX_BANDWIDTH};
pub use wire::{Role, Wire};
pub use graph::{ComponentNode, Graph};
pub use clock::Clock;
pub use event::{Action, EventId, ScheduledEvent, Timing};
pub use scheduler::{Scheduler, SchedulerState};
pub use component::{Component, Context};
pub use engine::Simulation;
pub use config::{ConfigError, SimConfig, SimConfigBuilder};
pub use stats::SchedulerStats;
pub use trace::{Trace, TraceEntry, TraceKind};
pub use handler::{EventFilter, EventHandler, HandlerId};
pub use probe::{Observation, Probe};
pub use parallel::SimulationBatch;

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging.
///
/// # Example
///
/// ```rust,ignore
/// logy::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
