//! CG on distributed systems: small exact cases and generated SPD problems

use bspcg::bsp::{self, Bsp};
use bspcg::dist::random_owners;
use bspcg::generate::{partition_nonzeros, spd_matrix};
use bspcg::{
    conjugate_gradient, reference_spmv, sequential_cg, CgReport, CgSystem, IcrsMatrix, LocalMatrix, MatrixFile,
    OwnershipTable, SolverConfig, Triplet, VectorDistribution,
};

/// Solves with every vector distributed by `owners`; returns the assembled
/// solution and the reports of all processors.
fn distributed_cg(
    file: &MatrixFile,
    owners: &[usize],
    b: &[f64],
    config: &SolverConfig,
) -> (Vec<f64>, Vec<CgReport>) {
    let n = file.rows;
    let parts = bsp::run(file.nprocs, |ctx| {
        let dist = VectorDistribution::from_owners(ctx.pid(), owners);
        let table = OwnershipTable::build(ctx, &dist)?;
        let matrix = IcrsMatrix::load(file.part(ctx.pid()).to_vec(), n);
        let mut system = CgSystem::new(ctx, matrix, &dist, &table)?;
        let mut u = vec![0.0; dist.len()];
        let report = conjugate_gradient(ctx, &mut system, &dist.restrict(b), &mut u, config)?;
        Ok((dist, u, report))
    })
    .unwrap();

    let mut solution = vec![0.0; n];
    let mut reports = Vec::new();
    for (dist, u, report) in parts {
        for (&g, value) in dist.index().iter().zip(u) {
            solution[g] = value;
        }
        reports.push(report);
    }
    (solution, reports)
}

#[test]
fn test_two_by_two_single_processor() {
    let triplets = vec![
        Triplet::new(0, 0, 4.0),
        Triplet::new(0, 1, 1.0),
        Triplet::new(1, 0, 1.0),
        Triplet::new(1, 1, 3.0),
    ];
    let file = MatrixFile::from_parts(2, vec![triplets]);
    let (u, reports) = distributed_cg(&file, &[0, 0], &[1.0, 2.0], &SolverConfig::default());

    assert!(reports[0].converged);
    assert!(reports[0].iterations <= 2);
    assert!((u[0] - 0.0909).abs() < 1e-4);
    assert!((u[1] - 0.6364).abs() < 1e-4);
}

#[test]
fn test_equal_diagonal_converges_in_one_iteration() {
    let n = 23;
    let triplets: Vec<_> = (0..n).map(|i| Triplet::new(i, i, 2.5)).collect();
    for nprocs in 1..=4 {
        let file = partition_nonzeros(n, &triplets, nprocs, 7);
        let owners = random_owners(n, nprocs, 8);
        let (u, reports) = distributed_cg(&file, &owners, &vec![1.0; n], &SolverConfig::default());
        for report in &reports {
            assert!(report.converged);
            assert_eq!(report.iterations, 1);
        }
        for value in u {
            assert!((value - 0.4).abs() < 1e-12);
        }
    }
}

#[test]
fn test_distinct_diagonal_needs_one_iteration_per_value() {
    // CG on a diagonal matrix with b = 1 terminates after as many
    // iterations as there are distinct diagonal values.
    let n = 30;
    let d = |i: usize| 1.0 + (i % 3) as f64;
    let triplets: Vec<_> = (0..n).map(|i| Triplet::new(i, i, d(i))).collect();
    let file = partition_nonzeros(n, &triplets, 3, 1);
    let owners = random_owners(n, 3, 2);
    let (u, reports) = distributed_cg(&file, &owners, &vec![1.0; n], &SolverConfig::default());

    assert!(reports.iter().all(|r| r.converged && r.iterations <= 3));
    for (i, value) in u.into_iter().enumerate() {
        assert!((value - 1.0 / d(i)).abs() < 1e-9);
    }
}

#[test]
fn test_generated_problem_matches_sequential_solver() {
    let n = 120;
    let triplets = spd_matrix(n, 4, 42);
    let b = reference_spmv(n, &triplets, &vec![1.0; n]);
    let config = SolverConfig::default().with_tolerance(1e-10);
    let (sequential, seq_report) = sequential_cg(n, &triplets, &b, &config).unwrap();
    assert!(seq_report.converged);

    for nprocs in [2, 4] {
        let file = partition_nonzeros(n, &triplets, nprocs, 100 + nprocs as u64);
        let owners = random_owners(n, nprocs, 200 + nprocs as u64);
        let (u, reports) = distributed_cg(&file, &owners, &b, &config);

        let report = reports[0];
        assert!(report.converged);
        assert!(report.iterations <= 2 * n);
        // Every processor took the same decisions
        assert!(reports.iter().all(|r| *r == report));
        for g in 0..n {
            assert!((u[g] - 1.0).abs() < 1e-7);
            assert!((u[g] - sequential[g]).abs() < 1e-7);
        }
    }
}

#[test]
fn test_nonzero_initial_guess() {
    let n = 10;
    let triplets = spd_matrix(n, 2, 5);
    let b = reference_spmv(n, &triplets, &vec![2.0; n]);
    let file = partition_nonzeros(n, &triplets, 2, 6);
    let owners = random_owners(n, 2, 7);

    let reports = bsp::run(2, |ctx| {
        let dist = VectorDistribution::from_owners(ctx.pid(), &owners);
        let table = OwnershipTable::build(ctx, &dist)?;
        let matrix = IcrsMatrix::load(file.part(ctx.pid()).to_vec(), n);
        let mut system = CgSystem::new(ctx, matrix, &dist, &table)?;
        // Starting at the solution needs no iterations
        let mut u = vec![2.0; dist.len()];
        conjugate_gradient(ctx, &mut system, &dist.restrict(&b), &mut u, &SolverConfig::default())
    })
    .unwrap();
    assert!(reports.iter().all(|r| r.converged && r.iterations == 0));
}
