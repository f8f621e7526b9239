//! Distributed inner product of two independently distributed vectors

use crate::bsp::{Bsp, Buffer, RegId};
use crate::dist::{OwnershipTable, RemoteGather, VectorDistribution};
use crate::error::{Error, Result};
use crate::utils::CompensatedSum;

/// `⟨x, y⟩` with the routing of `y` onto `x`'s local index set resolved
/// once.
///
/// The local partial sum and the final reduction both use compensated
/// summation. The reduction adds the partial sums in processor order, so
/// every processor obtains the bitwise same value.
pub struct InnerProduct {
    x_len: usize,
    y: RemoteGather,
    partials: Buffer<f64>,
    partials_reg: RegId,
}

impl InnerProduct {
    /// Collective, three supersteps.
    ///
    /// `x` is distributed by `x_dist`; `y` by the distribution behind
    /// `y_table`, with `y_len` components on this processor.
    pub fn new<C: Bsp>(
        ctx: &mut C,
        x_dist: &VectorDistribution,
        y_table: &OwnershipTable,
        y_len: usize,
    ) -> Result<Self> {
        if x_dist.global_len() != y_table.global_len() {
            return Err(Error::LengthMismatch {
                what: "inner product operand",
                expected: x_dist.global_len(),
                actual: y_table.global_len(),
            });
        }
        let routing = y_table.resolve(ctx, x_dist.index())?;
        let partials = Buffer::filled("inner product partials", ctx.nprocs(), 0.0)?;
        let partials_reg = ctx.push_reg(&partials);
        let y = RemoteGather::new(ctx, routing, y_len)?;
        Ok(Self {
            x_len: x_dist.len(),
            y,
            partials,
            partials_reg,
        })
    }

    /// Computes `⟨x, y⟩` from the local components. Collective, two supersteps.
    pub fn compute<C: Bsp>(&self, ctx: &mut C, x: &[f64], y: &[f64]) -> Result<f64> {
        if x.len() != self.x_len {
            return Err(Error::LengthMismatch {
                what: "inner product x",
                expected: self.x_len,
                actual: x.len(),
            });
        }

        self.y.stage(ctx, y)?;
        ctx.sync()?;

        let partial: CompensatedSum = {
            let y_local = self.y.landed();
            x.iter().zip(y_local.iter()).map(|(a, b)| a * b).collect()
        };
        let pid = ctx.pid();
        for t in 0..ctx.nprocs() {
            ctx.put(t, &[partial.value()], self.partials_reg, pid)?;
        }
        ctx.sync()?;

        let total: CompensatedSum = self.partials.read().iter().copied().collect();
        Ok(total.value())
    }

    /// Deregisters both buffers, effective at the next `sync`.
    pub fn release<C: Bsp>(self, ctx: &mut C) -> Result<()> {
        ctx.pop_reg(self.partials_reg)?;
        self.y.release(ctx)
    }
}
