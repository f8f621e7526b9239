//! Run and solver configuration

use tracing::warn;

use crate::error::{Error, Result};

/// Parameters of the BSP machine
#[derive(Debug, Clone)]
pub struct BspConfig {
    /// Number of processors (SPMD ranks) to run
    pub nprocs: usize,
}

impl Default for BspConfig {
    fn default() -> Self {
        Self {
            nprocs: num_cpus::get(), // One rank per available core
        }
    }
}

impl BspConfig {
    /// Create a config for a fixed processor count
    pub fn with_nprocs(nprocs: usize) -> Self {
        Self { nprocs }
    }

    /// Check the processor count.
    ///
    /// Zero processors is rejected. More processors than cores is allowed
    /// (ranks block at barriers, so oversubscription is only slower) but
    /// logged.
    pub fn validate(&self) -> Result<()> {
        if self.nprocs == 0 {
            return Err(Error::Config("at least one processor is required".into()));
        }
        let cores = num_cpus::get();
        if self.nprocs > cores {
            warn!(
                nprocs = self.nprocs,
                cores, "more processors requested than available cores"
            );
        }
        Ok(())
    }
}

/// Stopping rule for the CG iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Relative residual threshold: stop once `‖r‖ <= tolerance · ‖b‖`
    pub tolerance: f64,

    /// Iteration cap; reaching it is reported, not treated as an error
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1.0e-9,
            max_iterations: 1000,
        }
    }
}

impl SolverConfig {
    /// Replace the relative tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Replace the iteration cap
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}
