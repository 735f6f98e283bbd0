//! Reversible logic gate simulation demo.
//!
//! Two sources drive pseudo-random bits into an AND gate every few ticks.
//! The gate's output travels to a sink observed by a probe. The demo runs
//! forward, rewinds half way, checks that the rewound state matches what
//! the probe saw at that time, then replays to the end.
//!
//! Run with: `cargo run --example logic_gate [config.yaml]`

use logy::component::{from_fn, Passive};
use logy::{Capability, Context, Probe, SimConfig, SimTime, Simulation, Timing};

const PERIOD: SimTime = 5;
const SIM_TIME: SimTime = 200;
const GATE_DELAY: SimTime = 2;
const WIRE_DELAY: SimTime = 1;

/// Xorshift64 bit stream.
struct BitStream {
    seed: u64,
}

impl BitStream {
    fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn next_bit(&mut self) -> u64 {
        let mut x = self.seed;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.seed = x;
        x & 1
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };
    logy::init_logging(&config.simulation.log_level);

    let mut sim = Simulation::from_config(&config).with_trace(true);

    // Topology
    let src_a = sim.add_component("src_a", Passive);
    let src_b = sim.add_component("src_b", Passive);
    let gate = sim.add_component(
        "and",
        from_fn(|ctx: &mut Context<'_>, _pin| {
            let a = ctx.read_named("a").unwrap_or(0);
            let b = ctx.read_named("b").unwrap_or(0);
            if let Err(err) = ctx.write_named("y", a & b) {
                tracing::error!(error = %err, "gate write failed");
            }
        }),
    );
    let probe = Probe::new();
    let sink = sim.add_component("sink", probe.clone());

    let a_out = sim.add_pin(src_a, "out", 1, Capability::Writeable)?;
    let b_out = sim.add_pin(src_b, "out", 1, Capability::Writeable)?;
    let gate_a = sim.add_pin(gate, "a", 1, Capability::Readable)?;
    let gate_b = sim.add_pin(gate, "b", 1, Capability::Readable)?;
    let gate_y = sim.add_pin(gate, "y", 1, Capability::Writeable)?;
    let sink_in = sim.add_pin(sink, "in", 1, Capability::Readable)?;

    let net_a = sim.add_wire("net_a");
    sim.attach(a_out, net_a, 0)?;
    sim.attach(gate_a, net_a, WIRE_DELAY)?;
    let net_b = sim.add_wire("net_b");
    sim.attach(b_out, net_b, 0)?;
    sim.attach(gate_b, net_b, WIRE_DELAY)?;
    let net_y = sim.add_wire("net_y");
    sim.attach(gate_y, net_y, 0)?;
    sim.attach(sink_in, net_y, GATE_DELAY)?;

    // Stimulus
    let mut bits_a = BitStream::new(0x9E37_79B9_7F4A_7C15);
    let mut bits_b = BitStream::new(0xD1B5_4A32_D192_ED03);
    let mut t = 0;
    while t < SIM_TIME {
        sim.schedule_write(a_out, bits_a.next_bit(), Timing::At(t))?;
        sim.schedule_write(b_out, bits_b.next_bit(), Timing::At(t))?;
        t += PERIOD;
    }

    println!("=== Reversible AND gate ===");
    sim.advance(SIM_TIME)?;
    let final_value = sim.read(sink_in)?;
    println!(
        "T={} sink={} updates={} executed={}",
        sim.now(),
        final_value,
        probe.count(),
        sim.stats().executed
    );

    // Rewind half way and compare with what the probe recorded.
    let midpoint = SIM_TIME / 2;
    let expected = probe
        .observations()
        .iter()
        .filter(|o| o.time <= midpoint)
        .last()
        .and_then(|o| o.value)
        .unwrap_or(0);
    sim.jump(midpoint)?;
    println!(
        "T={} sink={} (expected {}) pending={}",
        sim.now(),
        sim.read(sink_in)?,
        expected,
        sim.pending_count()
    );

    sim.jump(SIM_TIME)?;
    println!("T={} sink={} after replay", sim.now(), sim.read(sink_in)?);
    assert_eq!(sim.read(sink_in)?, final_value);

    if let Some(trace) = sim.trace() {
        println!("Trace entries: {}", trace.len());
    }

    println!();
    print!("{}", sim.stats().summary());
    println!("{}", serde_json::to_string_pretty(&sim.export_stats())?);

    if let Some(path) = &config.simulation.stats_output {
        if path.ends_with(".csv") {
            sim.stats().to_csv_file(path)?;
        } else {
            sim.stats().to_json_file(path)?;
        }
        println!("Statistics written to {path}");
    }

    Ok(())
}
