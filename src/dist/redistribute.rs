//! Moving a dense vector between two distributions

use crate::bsp::Bsp;
use crate::dist::{OwnershipTable, RemoteGather, VectorDistribution};
use crate::error::{Error, Result};

/// Copies a vector stored under one distribution into another distribution
/// of the same global length, with a single batched remote read.
pub struct Redistribution {
    gather: RemoteGather,
}

impl Redistribution {
    /// Resolves the target's global indices against the source's table.
    ///
    /// Collective, three supersteps.
    pub fn new<C: Bsp>(
        ctx: &mut C,
        source: &OwnershipTable,
        source_len: usize,
        target: &VectorDistribution,
    ) -> Result<Self> {
        if source.global_len() != target.global_len() {
            return Err(Error::LengthMismatch {
                what: "redistributed vector",
                expected: source.global_len(),
                actual: target.global_len(),
            });
        }
        let routing = source.resolve(ctx, target.index())?;
        let gather = RemoteGather::new(ctx, routing, source_len)?;
        Ok(Self { gather })
    }

    /// `target[i] = source[g]` for the global index `g` of target slot `i`.
    ///
    /// Collective, one superstep.
    pub fn apply<C: Bsp>(&self, ctx: &mut C, source: &[f64], target: &mut [f64]) -> Result<()> {
        self.gather.gather_into(ctx, source, target)
    }

    /// Deregisters the underlying buffer, effective at the next `sync`.
    pub fn release<C: Bsp>(self, ctx: &mut C) -> Result<()> {
        self.gather.release(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp;
    use crate::dist::{block_owners, random_owners};

    #[test]
    fn test_block_to_random() {
        let n = 13;
        let global: Vec<f64> = (0..n).map(|g| g as f64 * 0.5).collect();
        let from = block_owners(n, 3);
        let to = random_owners(n, 3, 9);

        let results = bsp::run(3, |ctx| {
            let src = VectorDistribution::from_owners(ctx.pid(), &from);
            let dst = VectorDistribution::from_owners(ctx.pid(), &to);
            let table = OwnershipTable::build(ctx, &src)?;
            let redistribution = Redistribution::new(ctx, &table, src.len(), &dst)?;

            let values = src.restrict(&global);
            let mut out = vec![0.0; dst.len()];
            redistribution.apply(ctx, &values, &mut out)?;
            Ok((dst, out))
        })
        .unwrap();

        for (dst, out) in results {
            assert_eq!(out, dst.restrict(&global));
        }
    }

    #[test]
    fn test_length_mismatch() {
        let result = bsp::run(1, |ctx| {
            let src = VectorDistribution::new(2, vec![0, 1]);
            let table = OwnershipTable::build(ctx, &src)?;
            Redistribution::new(ctx, &table, 2, &VectorDistribution::new(3, vec![0, 1, 2])).map(|_| ())
        });
        assert!(matches!(result, Err(Error::LengthMismatch { .. })));
    }
}
