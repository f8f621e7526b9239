//! Tests for ownership tables, routing resolution and redistribution

use bspcg::bsp::{self, Bsp};
use bspcg::dist::{block_owners, cyclic_owners, random_owners, GlobalOwnership};
use bspcg::{Error, OwnershipTable, Redistribution, VectorDistribution};

#[test]
fn test_resolution_agrees_with_global_table() {
    let n = 57;
    for nprocs in 1..=4 {
        let owners = random_owners(n, nprocs, nprocs as u64);
        let oracle = GlobalOwnership::from_owners(&owners, nprocs).unwrap();

        let checks = bsp::run(nprocs, |ctx| {
            let dist = VectorDistribution::from_owners(ctx.pid(), &owners);
            let table = OwnershipTable::build(ctx, &dist)?;
            // Ask for every index, in reverse, to exercise all homes
            let wanted: Vec<usize> = (0..n).rev().collect();
            let routing = table.resolve(ctx, &wanted)?;
            Ok(routing == oracle.resolve(&wanted)?)
        })
        .unwrap();
        assert!(checks.into_iter().all(|ok| ok));
    }
}

#[test]
fn test_own_indices_resolve_to_identity() {
    let owners = cyclic_owners(10, 3);
    let identities = bsp::run(3, |ctx| {
        let dist = VectorDistribution::from_owners(ctx.pid(), &owners);
        let table = OwnershipTable::build(ctx, &dist)?;
        let routing = table.resolve(ctx, dist.index())?;
        Ok(routing.is_identity_on(ctx.pid()))
    })
    .unwrap();
    assert_eq!(identities, vec![true, true, true]);
}

#[test]
fn test_unowned_index_is_fatal() {
    let result = bsp::run(2, |ctx| {
        // Index 3 of 4 is never claimed
        let index = if ctx.pid() == 0 { vec![0, 2] } else { vec![1] };
        OwnershipTable::build(ctx, &VectorDistribution::new(4, index)).map(|_| ())
    });
    assert!(matches!(result, Err(Error::Unowned { index: 3 })));
}

#[test]
fn test_out_of_range_index_is_fatal() {
    let result = bsp::run(2, |ctx| {
        let index = if ctx.pid() == 0 { vec![0, 1] } else { vec![5] };
        OwnershipTable::build(ctx, &VectorDistribution::new(2, index)).map(|_| ())
    });
    assert!(matches!(result, Err(Error::IndexOutOfRange { index: 5, n: 2 })));
}

#[test]
fn test_resolve_out_of_range_request() {
    let result = bsp::run(2, |ctx| {
        let dist = VectorDistribution::block(4, 2, ctx.pid());
        let table = OwnershipTable::build(ctx, &dist)?;
        table.resolve(ctx, &[0, 4]).map(|_| ())
    });
    assert!(matches!(result, Err(Error::IndexOutOfRange { index: 4, n: 4 })));
}

#[test]
fn test_redistribution_round_trip() {
    let n = 31;
    let global: Vec<f64> = (0..n).map(|g| (g * g) as f64).collect();
    let a = block_owners(n, 4);
    let b = random_owners(n, 4, 77);

    let ok = bsp::run(4, |ctx| {
        let da = VectorDistribution::from_owners(ctx.pid(), &a);
        let db = VectorDistribution::from_owners(ctx.pid(), &b);
        let ta = OwnershipTable::build(ctx, &da)?;
        let tb = OwnershipTable::build(ctx, &db)?;
        let forward = Redistribution::new(ctx, &ta, da.len(), &db)?;
        let backward = Redistribution::new(ctx, &tb, db.len(), &da)?;

        let start = da.restrict(&global);
        let mut moved = vec![0.0; db.len()];
        let mut back = vec![0.0; da.len()];
        forward.apply(ctx, &start, &mut moved)?;
        backward.apply(ctx, &moved, &mut back)?;
        Ok(moved == db.restrict(&global) && back == start)
    })
    .unwrap();
    assert!(ok.into_iter().all(|ok| ok));
}
