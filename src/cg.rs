//! Unpreconditioned conjugate gradient over the distributed primitives

use std::fmt;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::bsp::Bsp;
use crate::config::SolverConfig;
use crate::dist::{OwnershipTable, VectorDistribution};
use crate::error::{try_alloc, Error, Result};
use crate::inprod::InnerProduct;
use crate::matrix::LocalMatrix;
use crate::spmv::SpmvPlan;

/// Outcome of a CG solve. Not converging within the iteration cap is a
/// normal outcome, reported through `converged`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CgReport {
    /// Iterations performed
    pub iterations: usize,
    /// Whether `‖r‖ <= tolerance · ‖b‖` was reached
    pub converged: bool,
    /// `‖r‖` of the final residual
    pub residual_norm: f64,
    /// `‖b‖`
    pub rhs_norm: f64,
}

impl CgReport {
    /// `‖r‖ / ‖b‖`, or `‖r‖` when `b = 0`
    pub fn relative_residual(&self) -> f64 {
        if self.rhs_norm > 0.0 {
            self.residual_norm / self.rhs_norm
        } else {
            self.residual_norm
        }
    }
}

impl fmt::Display for CgReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} iterations, |r| = {:e}, |r|/|b| = {:e}",
            if self.converged { "converged" } else { "not converged" },
            self.iterations,
            self.residual_norm,
            self.relative_residual()
        )
    }
}

/// The operators of one linear system `A·u = b`, set up once.
///
/// All CG vectors share one distribution; the matrix nonzeros are
/// distributed independently of it.
pub struct CgSystem<M> {
    spmv: SpmvPlan<M>,
    dot: InnerProduct,
    len: usize,
}

impl<M: LocalMatrix<f64>> CgSystem<M> {
    /// Resolves the multiply and inner-product routing. Collective.
    pub fn new<C: Bsp>(
        ctx: &mut C,
        matrix: M,
        dist: &VectorDistribution,
        table: &OwnershipTable,
    ) -> Result<Self> {
        let len = dist.len();
        let spmv = SpmvPlan::new(ctx, matrix, table, len, table, len)?;
        let dot = InnerProduct::new(ctx, dist, table, len)?;
        Ok(Self { spmv, dot, len })
    }

    /// Number of local vector components
    pub fn local_len(&self) -> usize {
        self.len
    }

    /// `u = A·v`, collective
    pub fn multiply<C: Bsp>(&mut self, ctx: &mut C, v: &[f64], u: &mut [f64]) -> Result<()> {
        self.spmv.multiply(ctx, v, u)
    }

    /// `⟨x, y⟩`, collective
    pub fn dot<C: Bsp>(&self, ctx: &mut C, x: &[f64], y: &[f64]) -> Result<f64> {
        self.dot.compute(ctx, x, y)
    }

    /// Deregisters the communication buffers, effective at the next `sync`.
    pub fn release<C: Bsp>(self, ctx: &mut C) -> Result<()> {
        self.spmv.release(ctx)?;
        self.dot.release(ctx)
    }
}

/// Solves `A·u = b` starting from the current contents of `u`.
///
/// Every processor takes the same decisions, because every scalar comes
/// from the inner product, which is bitwise identical on all processors.
pub fn conjugate_gradient<C, M>(
    ctx: &mut C,
    system: &mut CgSystem<M>,
    b: &[f64],
    u: &mut [f64],
    config: &SolverConfig,
) -> Result<CgReport>
where
    C: Bsp,
    M: LocalMatrix<f64>,
{
    let n = system.local_len();
    for (what, actual) in [("right-hand side", b.len()), ("solution", u.len())] {
        if actual != n {
            return Err(Error::LengthMismatch {
                what,
                expected: n,
                actual,
            });
        }
    }

    let start = Instant::now();
    let mut r = try_alloc("residual", n, 0.0)?;
    let mut p = try_alloc("search direction", n, 0.0)?;
    let mut w = try_alloc("matrix-vector product", n, 0.0)?;

    // r = b - A·u
    system.multiply(ctx, u, &mut w)?;
    for ((ri, &bi), &wi) in r.iter_mut().zip(b).zip(&w) {
        *ri = bi - wi;
    }

    let rhs_norm = system.dot(ctx, b, b)?.sqrt();
    let threshold = config.tolerance * rhs_norm;
    let mut rho = system.dot(ctx, &r, &r)?;
    let mut rho_old = 0.0;
    let mut k = 0;

    while k < config.max_iterations && rho.sqrt() > threshold {
        if k == 0 {
            p.copy_from_slice(&r);
        } else {
            let beta = rho / rho_old;
            for (pi, &ri) in p.iter_mut().zip(&r) {
                *pi = ri + beta * *pi;
            }
        }

        system.multiply(ctx, &p, &mut w)?;
        let gamma = system.dot(ctx, &p, &w)?;
        if !(gamma.is_finite() && gamma > 0.0) {
            if ctx.pid() == 0 {
                warn!(iteration = k, gamma, "CG breakdown: matrix is not positive definite");
            }
            break;
        }
        let alpha = rho / gamma;

        for (ui, &pi) in u.iter_mut().zip(&p) {
            *ui += alpha * pi;
        }
        for (ri, &wi) in r.iter_mut().zip(&w) {
            *ri -= alpha * wi;
        }

        rho_old = rho;
        rho = system.dot(ctx, &r, &r)?;
        k += 1;

        if ctx.pid() == 0 {
            debug!(iteration = k, residual = rho.sqrt(), "CG iteration");
        }
    }

    let report = CgReport {
        iterations: k,
        converged: rho.sqrt() <= threshold,
        residual_norm: rho.sqrt(),
        rhs_norm,
    };
    if ctx.pid() == 0 {
        info!(
            iterations = report.iterations,
            converged = report.converged,
            residual = report.residual_norm,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "CG finished"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp;
    use crate::matrix::{IcrsMatrix, Triplet};

    fn solve_two_by_two(nprocs: usize) -> Vec<(Vec<usize>, Vec<f64>, CgReport)> {
        bsp::run(nprocs, |ctx| {
            // Processor 0 holds every nonzero; the vectors are cyclic
            let triplets = if ctx.pid() == 0 {
                vec![
                    Triplet::new(0, 0, 4.0),
                    Triplet::new(0, 1, 1.0),
                    Triplet::new(1, 0, 1.0),
                    Triplet::new(1, 1, 3.0),
                ]
            } else {
                Vec::new()
            };
            let dist = VectorDistribution::cyclic(2, ctx.nprocs(), ctx.pid());
            let table = OwnershipTable::build(ctx, &dist)?;
            let mut system = CgSystem::new(ctx, IcrsMatrix::load(triplets, 2), &dist, &table)?;

            let b = dist.restrict(&[1.0, 2.0]);
            let mut u = vec![0.0; dist.len()];
            let report = conjugate_gradient(ctx, &mut system, &b, &mut u, &SolverConfig::default())?;
            Ok((dist.index().to_vec(), u, report))
        })
        .unwrap()
    }

    #[test]
    fn test_two_by_two() {
        for nprocs in 1..=3 {
            let mut solution = [0.0; 2];
            for (index, u, report) in solve_two_by_two(nprocs) {
                assert!(report.converged);
                assert!(report.iterations <= 2);
                for (g, value) in index.into_iter().zip(u) {
                    solution[g] = value;
                }
            }
            assert!((solution[0] - 1.0 / 11.0).abs() < 1e-9);
            assert!((solution[1] - 7.0 / 11.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_iteration_cap_is_not_an_error() {
        let reports = bsp::run(1, |ctx| {
            let triplets: Vec<_> = (0..4).map(|i| Triplet::new(i, i, (i + 1) as f64)).collect();
            let dist = VectorDistribution::new(4, (0..4).collect());
            let table = OwnershipTable::build(ctx, &dist)?;
            let mut system = CgSystem::new(ctx, IcrsMatrix::load(triplets, 4), &dist, &table)?;
            let mut u = vec![0.0; 4];
            let config = SolverConfig::default().with_max_iterations(1);
            conjugate_gradient(ctx, &mut system, &[1.0; 4], &mut u, &config)
        })
        .unwrap();
        assert_eq!(reports[0].iterations, 1);
        assert!(!reports[0].converged);
        assert!(reports[0].residual_norm > 0.0);
    }

    #[test]
    fn test_report_display() {
        let report = CgReport {
            iterations: 3,
            converged: true,
            residual_norm: 1e-12,
            rhs_norm: 2.0,
        };
        assert!(report.to_string().starts_with("converged after 3 iterations"));
        assert_eq!(report.relative_residual(), 5e-13);
    }
}
