//! # BSPCG: Conjugate Gradient over Bulk Synchronous Parallel SpMV
//!
//! BSPCG solves sparse symmetric positive-definite systems `A·u = b` with the
//! conjugate gradient method, where the matrix nonzeros and every vector are
//! distributed arbitrarily and independently over P processors.
//!
//! ## Overview
//!
//! The processors run one SPMD program and communicate only through the
//! superstep primitives of the [`bsp`] module. The library is organised as:
//!
//! - **Local Sparse Store** ([`matrix`]): each processor's nonzeros in
//!   incremental compressed row storage, built by radix sort
//! - **Distribution Resolver** ([`dist`]): ownership tables of the vectors
//!   and the routing arrays resolved from them once
//! - **Distributed SpMV** ([`spmv`]) and **Inner Product** ([`inprod`]),
//!   replaying the resolved routing every call
//! - **CG** ([`cg`]) composed from the two
//!
//! plus file input ([`io`]), a test-problem generator ([`generate`]) and an
//! end-to-end driver ([`driver`]).
//!
//! ## Usage
//!
//! Solving a small system on two processors:
//!
//! ```
//! use bspcg::bsp::{self, Bsp};
//! use bspcg::{conjugate_gradient, CgSystem, IcrsMatrix, LocalMatrix, OwnershipTable};
//! use bspcg::{SolverConfig, Triplet, VectorDistribution};
//!
//! let parts = bsp::run(2, |ctx| {
//!     // Each processor holds one row of [[4, 1], [1, 3]]
//!     let row = ctx.pid();
//!     let triplets = vec![
//!         Triplet::new(row, 0, if row == 0 { 4.0 } else { 1.0 }),
//!         Triplet::new(row, 1, if row == 0 { 1.0 } else { 3.0 }),
//!     ];
//!     let dist = VectorDistribution::cyclic(2, ctx.nprocs(), ctx.pid());
//!     let table = OwnershipTable::build(ctx, &dist)?;
//!     let mut system = CgSystem::new(ctx, IcrsMatrix::load(triplets, 2), &dist, &table)?;
//!
//!     let b = dist.restrict(&[1.0, 2.0]);
//!     let mut u = vec![0.0; dist.len()];
//!     let report = conjugate_gradient(ctx, &mut system, &b, &mut u, &SolverConfig::default())?;
//!     assert!(report.converged);
//!     Ok(u)
//! })
//! .unwrap();
//!
//! assert!((parts[0][0] - 1.0 / 11.0).abs() < 1e-9);
//! assert!((parts[1][0] - 7.0 / 11.0).abs() < 1e-9);
//! ```

pub mod bsp;
pub mod cg;
pub mod config;
pub mod dist;
pub mod driver;
pub mod error;
pub mod generate;
pub mod inprod;
pub mod io;
pub mod matrix;
pub mod spmv;
pub mod utils;

// Re-export primary components
pub use bsp::{run, Bsp, Buffer, ThreadedContext};
pub use cg::{conjugate_gradient, CgReport, CgSystem};
pub use config::{BspConfig, SolverConfig};
pub use dist::{OwnershipTable, Redistribution, RemoteGather, Routing, VectorDistribution};
pub use driver::{solve, solve_distributed, LocalSolution, Solution, SolveInputs};
pub use error::{Error, Result};
pub use inprod::InnerProduct;
pub use io::{MatrixFile, VectorFile};
pub use matrix::{reference_spmv, sequential_cg, CrsMatrix, IcrsMatrix, LocalMatrix, Triplet};
pub use spmv::SpmvPlan;
pub use utils::{to_sprs_csr, triplets_to_sprs, CompensatedSum};

/// Version information for the BSPCG library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
