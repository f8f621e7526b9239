//! End-to-end distributed solve from input files

use std::path::Path;
use std::time::Instant;

use tracing::info;

use crate::bsp::{self, Bsp};
use crate::cg::{conjugate_gradient, CgReport, CgSystem};
use crate::config::{BspConfig, SolverConfig};
use crate::dist::Redistribution;
use crate::error::{try_alloc, Error, Result};
use crate::io::{distribute_matrix, distribute_vector, MatrixFile, VectorFile};
use crate::matrix::{IcrsMatrix, LocalMatrix};

/// The three input files of a solve, held by processor 0
#[derive(Debug, Clone)]
pub struct SolveInputs {
    /// Distributed matrix `A`
    pub matrix: MatrixFile,
    /// Distribution and values of `b`
    pub rhs: VectorFile,
    /// Distribution of the solution `u`
    pub solution: VectorFile,
}

impl SolveInputs {
    /// Read and validate all three files
    pub fn read(matrix: impl AsRef<Path>, rhs: impl AsRef<Path>, solution: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            matrix: MatrixFile::read(matrix)?,
            rhs: VectorFile::read(rhs)?,
            solution: VectorFile::read(solution)?,
        })
    }
}

/// One processor's part of the solution
#[derive(Debug, Clone)]
pub struct LocalSolution {
    /// Global index of every local component
    pub index: Vec<usize>,
    pub values: Vec<f64>,
    pub report: CgReport,
}

/// The assembled solution
#[derive(Debug, Clone)]
pub struct Solution {
    pub values: Vec<f64>,
    pub report: CgReport,
}

/// Distributes the inputs, sets up the multiply and inner product once, and
/// runs CG from `u = 0`.
///
/// Only processor 0's `inputs` are consulted. Collective.
pub fn solve_distributed<C: Bsp>(
    ctx: &mut C,
    inputs: Option<&SolveInputs>,
    config: &SolverConfig,
) -> Result<LocalSolution> {
    let start = Instant::now();

    let (n, triplets) = distribute_matrix(ctx, inputs.map(|i| &i.matrix))?;
    let rhs = distribute_vector(ctx, inputs.map(|i| &i.rhs))?;
    let solution = distribute_vector(ctx, inputs.map(|i| &i.solution))?;
    for (what, actual) in [
        ("right-hand side", rhs.table.global_len()),
        ("solution", solution.table.global_len()),
    ] {
        if actual != n {
            return Err(Error::LengthMismatch {
                what,
                expected: n,
                actual,
            });
        }
    }
    let b_source = rhs
        .values
        .ok_or_else(|| Error::Config("the right-hand side file carries no values".into()))?;

    let matrix = IcrsMatrix::load(triplets, n);
    let mut system = CgSystem::new(ctx, matrix, &solution.distribution, &solution.table)?;
    let to_solution = Redistribution::new(ctx, &rhs.table, rhs.distribution.len(), &solution.distribution)?;

    let local_len = solution.distribution.len();
    let mut b = try_alloc("right-hand side", local_len, 0.0)?;
    to_solution.apply(ctx, &b_source, &mut b)?;
    if ctx.pid() == 0 {
        info!(
            n,
            nprocs = ctx.nprocs(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "initialization done"
        );
    }

    let mut u = try_alloc("solution", local_len, 0.0)?;
    let report = conjugate_gradient(ctx, &mut system, &b, &mut u, config)?;

    system.release(ctx)?;
    to_solution.release(ctx)?;
    ctx.sync()?;

    Ok(LocalSolution {
        index: solution.distribution.index().to_vec(),
        values: u,
        report,
    })
}

/// Runs [`solve_distributed`] on a fresh machine and assembles the solution
/// in global order.
pub fn solve(inputs: &SolveInputs, bsp_config: &BspConfig, config: &SolverConfig) -> Result<Solution> {
    bsp_config.validate()?;
    let parts = bsp::run(bsp_config.nprocs, |ctx| {
        let mine = if ctx.pid() == 0 { Some(inputs) } else { None };
        solve_distributed(ctx, mine, config)
    })?;

    let n = inputs.matrix.rows;
    let mut values = try_alloc("assembled solution", n, 0.0)?;
    let mut report = None;
    for part in parts {
        for (&g, &value) in part.index.iter().zip(&part.values) {
            values[g] = value;
        }
        report.get_or_insert(part.report);
    }
    let report = report.ok_or_else(|| Error::Config("no processor reported".into()))?;
    Ok(Solution { values, report })
}
