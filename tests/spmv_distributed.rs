//! Distributed SpMV against the sequential sprs reference

use bspcg::bsp::{self, Bsp};
use bspcg::dist::{block_owners, cyclic_owners, random_owners};
use bspcg::generate::{partition_nonzeros, spd_matrix};
use bspcg::{
    reference_spmv, CrsMatrix, IcrsMatrix, LocalMatrix, MatrixFile, OwnershipTable, SpmvPlan, Triplet,
    VectorDistribution,
};

/// Runs `u = A·v` with the given nonzero partition and vector owners, and
/// assembles `u` in global order.
fn distributed_product<M: LocalMatrix<f64>>(
    file: &MatrixFile,
    v_owners: &[usize],
    u_owners: &[usize],
    v: &[f64],
) -> Vec<f64> {
    let n = file.rows;
    let parts = bsp::run(file.nprocs, |ctx| {
        let v_dist = VectorDistribution::from_owners(ctx.pid(), v_owners);
        let u_dist = VectorDistribution::from_owners(ctx.pid(), u_owners);
        let v_table = OwnershipTable::build(ctx, &v_dist)?;
        let u_table = OwnershipTable::build(ctx, &u_dist)?;

        let matrix = M::load(file.part(ctx.pid()).to_vec(), n);
        let mut plan = SpmvPlan::new(ctx, matrix, &v_table, v_dist.len(), &u_table, u_dist.len())?;
        let mut u = vec![f64::NAN; u_dist.len()];
        plan.multiply(ctx, &v_dist.restrict(v), &mut u)?;
        Ok((u_dist, u))
    })
    .unwrap();

    let mut global = vec![f64::NAN; n];
    for (dist, u) in parts {
        for (&g, value) in dist.index().iter().zip(u) {
            global[g] = value;
        }
    }
    global
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (g, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() <= 1e-10 * (1.0 + e.abs()), "component {}: {} vs {}", g, a, e);
    }
}

#[test]
fn test_matches_reference_for_all_distributions() {
    let n = 64;
    let triplets = spd_matrix(n, 5, 2024);
    let v: Vec<f64> = (0..n).map(|g| (g as f64 * 0.37).sin()).collect();
    let expected = reference_spmv(n, &triplets, &v);

    for nprocs in 1..=4 {
        let file = partition_nonzeros(n, &triplets, nprocs, 10 + nprocs as u64);
        let layouts = [
            (block_owners(n, nprocs), block_owners(n, nprocs)),
            (cyclic_owners(n, nprocs), block_owners(n, nprocs)),
            (random_owners(n, nprocs, 1), random_owners(n, nprocs, 2)),
        ];
        for (v_owners, u_owners) in &layouts {
            let u = distributed_product::<IcrsMatrix<f64>>(&file, v_owners, u_owners, &v);
            assert_close(&u, &expected);
        }
    }
}

#[test]
fn test_local_format_does_not_change_result() {
    let n = 40;
    let triplets = spd_matrix(n, 3, 8);
    let v: Vec<f64> = (0..n).map(|g| 1.0 / (1.0 + g as f64)).collect();
    let file = partition_nonzeros(n, &triplets, 3, 4);
    let owners = random_owners(n, 3, 6);

    let icrs = distributed_product::<IcrsMatrix<f64>>(&file, &owners, &owners, &v);
    let crs = distributed_product::<CrsMatrix<f64>>(&file, &owners, &owners, &v);
    assert_eq!(icrs, crs);
}

#[test]
fn test_repeated_multiply_is_bitwise_identical() {
    let n = 50;
    let triplets = spd_matrix(n, 6, 99);
    let file = partition_nonzeros(n, &triplets, 4, 3);
    let v_owners = random_owners(n, 4, 31);
    let u_owners = random_owners(n, 4, 32);
    let v: Vec<f64> = (0..n).map(|g| (g as f64).sqrt() - 3.0).collect();

    let runs = bsp::run(4, |ctx| {
        let v_dist = VectorDistribution::from_owners(ctx.pid(), &v_owners);
        let u_dist = VectorDistribution::from_owners(ctx.pid(), &u_owners);
        let v_table = OwnershipTable::build(ctx, &v_dist)?;
        let u_table = OwnershipTable::build(ctx, &u_dist)?;
        let matrix = IcrsMatrix::load(file.part(ctx.pid()).to_vec(), n);
        let mut plan = SpmvPlan::new(ctx, matrix, &v_table, v_dist.len(), &u_table, u_dist.len())?;

        let local_v = v_dist.restrict(&v);
        let mut first = vec![0.0; u_dist.len()];
        let mut second = vec![0.0; u_dist.len()];
        plan.multiply(ctx, &local_v, &mut first)?;
        // A different vector in between must not leave traces
        plan.multiply(ctx, &vec![1.0; v_dist.len()], &mut second)?;
        plan.multiply(ctx, &local_v, &mut second)?;
        Ok((first, second))
    })
    .unwrap();

    for (first, second) in runs {
        let a: Vec<u64> = first.iter().map(|x| x.to_bits()).collect();
        let b: Vec<u64> = second.iter().map(|x| x.to_bits()).collect();
        assert_eq!(a, b);
    }
}

#[test]
fn test_processor_without_nonzeros() {
    let n = 6;
    let triplets: Vec<Triplet<f64>> = (0..n).map(|i| Triplet::new(i, (i + 1) % n, 2.0)).collect();
    // Processor 1 holds nothing
    let file = MatrixFile::from_parts(n, vec![triplets[..3].to_vec(), Vec::new(), triplets[3..].to_vec()]);
    let v: Vec<f64> = (0..n).map(|g| g as f64).collect();
    let owners = cyclic_owners(n, 3);

    let u = distributed_product::<IcrsMatrix<f64>>(&file, &owners, &owners, &v);
    assert_eq!(u, reference_spmv(n, &triplets, &v));
}

#[test]
fn test_rows_touched_by_many_processors() {
    // Every processor holds one nonzero of row 0
    let n = 4;
    let parts: Vec<Vec<Triplet<f64>>> = (0..4).map(|q| vec![Triplet::new(0, q, 1.0 + q as f64)]).collect();
    let file = MatrixFile::from_parts(n, parts);
    let v = vec![1.0, 10.0, 100.0, 1000.0];
    let owners = vec![3, 2, 1, 0];

    let u = distributed_product::<IcrsMatrix<f64>>(&file, &owners, &owners, &v);
    assert_eq!(u, vec![4321.0, 0.0, 0.0, 0.0]);
}
