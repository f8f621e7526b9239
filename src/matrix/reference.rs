//! Sequential reference implementations on a single node
//!
//! These use `sprs` and `ndarray` directly and serve as a baseline for
//! correctness testing of the distributed algorithms, and as the `seq`
//! solver of the command line tool.

use ndarray::Array1;

use crate::cg::CgReport;
use crate::config::SolverConfig;
use crate::error::{Error, Result};
use crate::matrix::Triplet;
use crate::utils::triplets_to_sprs;

/// Computes `A·x` for an `n × n` matrix given as global triplets.
///
/// Duplicate positions are summed.
pub fn reference_spmv(n: usize, triplets: &[Triplet<f64>], x: &[f64]) -> Vec<f64> {
    assert_eq!(x.len(), n, "x must have length n");

    let a = triplets_to_sprs(n, triplets);
    let x = Array1::from(x.to_vec());
    let y: Array1<f64> = &a * &x;
    y.to_vec()
}

/// Solves `A·u = b` with unpreconditioned CG, starting from `u = 0`.
///
/// Same recurrence and stopping rule as the distributed solver.
pub fn sequential_cg(
    n: usize,
    triplets: &[Triplet<f64>],
    b: &[f64],
    config: &SolverConfig,
) -> Result<(Vec<f64>, CgReport)> {
    if b.len() != n {
        return Err(Error::LengthMismatch {
            what: "right-hand side",
            expected: n,
            actual: b.len(),
        });
    }

    let a = triplets_to_sprs(n, triplets);
    let b = Array1::from(b.to_vec());
    let mut u = Array1::<f64>::zeros(n);

    // r = b - A·u, which is b for the zero start
    let mut r = b.clone();
    let mut p = Array1::<f64>::zeros(n);
    let mut rho = r.dot(&r);
    let rhs_norm = b.dot(&b).sqrt();
    let mut rho_old = 0.0;
    let mut k = 0;

    while k < config.max_iterations && rho.sqrt() > config.tolerance * rhs_norm {
        if k == 0 {
            p.assign(&r);
        } else {
            let beta = rho / rho_old;
            p = &r + &(beta * &p);
        }
        let w: Array1<f64> = &a * &p;
        let gamma = p.dot(&w);
        let alpha = rho / gamma;
        u.scaled_add(alpha, &p);
        r.scaled_add(-alpha, &w);
        rho_old = rho;
        rho = r.dot(&r);
        k += 1;
    }

    let report = CgReport {
        iterations: k,
        converged: rho.sqrt() <= config.tolerance * rhs_norm,
        residual_norm: rho.sqrt(),
        rhs_norm,
    };
    Ok((u.to_vec(), report))
}
