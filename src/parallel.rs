//! Running independent simulations side by side.
//!
//! A [`Simulation`] is single-threaded and shares nothing with other
//! instances, so a batch of them can be driven concurrently. With the
//! `parallel` feature the batch fans out over rayon; without it the same
//! API runs the instances one after another.
//!
//! # Feature Flag
//!
//! ```toml
//! [dependencies]
//! logy = { version = "0.1", features = ["parallel"] }
//! ```

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::engine::Simulation;
use crate::error::SimResult;
use crate::types::SimTime;

/// A set of independent simulations driven in lockstep.
///
/// # Example
///
/// ```rust
/// use logy::parallel::SimulationBatch;
/// use logy::Simulation;
///
/// let mut batch = SimulationBatch::new();
/// batch.push(Simulation::new());
/// batch.push(Simulation::new());
///
/// for result in batch.advance_all(10) {
///     result.unwrap();
/// }
/// assert!(batch.simulations().iter().all(|s| s.now() == 10));
/// ```
#[derive(Default)]
pub struct SimulationBatch {
    sims: Vec<Simulation>,
    /// Number of worker threads (0 = auto)
    num_threads: usize,
}

impl SimulationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker threads.
    ///
    /// Pass 0 for automatic detection. Ignored without the `parallel`
    /// feature.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Adds a simulation and returns its index.
    pub fn push(&mut self, sim: Simulation) -> usize {
        self.sims.push(sim);
        self.sims.len() - 1
    }

    pub fn len(&self) -> usize {
        self.sims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sims.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Simulation> {
        self.sims.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Simulation> {
        self.sims.get_mut(index)
    }

    pub fn simulations(&self) -> &[Simulation] {
        &self.sims
    }

    pub fn into_inner(self) -> Vec<Simulation> {
        self.sims
    }

    /// Advances every simulation by `diff`. Results are in insertion order.
    pub fn advance_all(&mut self, diff: SimTime) -> Vec<SimResult<()>> {
        self.map(|sim| sim.advance(diff))
    }

    pub fn retreat_all(&mut self, diff: SimTime) -> Vec<SimResult<()>> {
        self.map(|sim| sim.retreat(diff))
    }

    pub fn jump_all(&mut self, time: SimTime) -> Vec<SimResult<()>> {
        self.map(|sim| sim.jump(time))
    }

    /// Applies `f` to every simulation and collects the results in
    /// insertion order.
    #[cfg(feature = "parallel")]
    pub fn map<R, F>(&mut self, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&mut Simulation) -> R + Sync + Send,
    {
        if self.num_threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.num_threads)
                .build_global()
                .ok(); // Ignore if already configured
        }
        self.sims.par_iter_mut().map(f).collect()
    }

    /// Applies `f` to every simulation and collects the results in
    /// insertion order.
    #[cfg(not(feature = "parallel"))]
    pub fn map<R, F>(&mut self, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&mut Simulation) -> R + Sync + Send,
    {
        self.sims.iter_mut().map(f).collect()
    }

    /// Exports statistics of every simulation as JSON.
    pub fn export_stats(&self) -> serde_json::Value {
        let runs: Vec<serde_json::Value> = self.sims.iter().map(|s| s.export_stats()).collect();
        serde_json::json!({
            "batch": {
                "size": self.sims.len(),
                "parallel": cfg!(feature = "parallel"),
                "threads": self.num_threads,
            },
            "runs": runs,
        })
    }
}
