//! A fixed remote-read pattern reused across supersteps

use parking_lot::RwLockReadGuard;
use tracing::trace;

use crate::bsp::{Bsp, Buffer, RegId};
use crate::dist::Routing;
use crate::error::{Error, Result};

/// Reads, for every resolved position `i`, the current value of component
/// `routing.owner(i)` / `routing.offset(i)` of a distributed vector into a
/// local landing array.
///
/// The source values are published through a registered buffer owned by the
/// gather, so the caller's vector storage stays plain local memory.
pub struct RemoteGather {
    routing: Routing,
    source: Buffer<f64>,
    landing: Buffer<f64>,
    reg: RegId,
    identity: bool,
}

impl RemoteGather {
    /// Registers the source buffer of `source_len` local components.
    ///
    /// Collective, one superstep.
    pub fn new<C: Bsp>(ctx: &mut C, routing: Routing, source_len: usize) -> Result<Self> {
        let source = Buffer::filled("gather source", source_len, 0.0)?;
        let landing = Buffer::filled("gather landing", routing.len(), 0.0)?;
        let reg = ctx.push_reg(&source);
        ctx.sync()?;

        let identity = routing.len() <= source_len && routing.is_identity_on(ctx.pid());
        Ok(Self {
            routing,
            source,
            landing,
            reg,
            identity,
        })
    }

    /// The resolved positions
    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    /// Number of components published by this processor
    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    /// Publishes `values` and stages the reads; the landing array holds the
    /// gathered values after the next `sync`.
    pub fn stage<C: Bsp>(&self, ctx: &mut C, values: &[f64]) -> Result<()> {
        self.source.copy_from(values)?;
        if self.identity {
            self.landing.copy_from(&values[..self.routing.len()])?;
            return Ok(());
        }
        let (owners, offsets) = self.routing.shared();
        trace!(pid = ctx.pid(), reads = owners.len(), "staging gather");
        ctx.get_indexed(self.reg, owners, offsets, &self.landing)
    }

    /// Gathers in one superstep and copies the result into `out`
    pub fn gather_into<C: Bsp>(&self, ctx: &mut C, values: &[f64], out: &mut [f64]) -> Result<()> {
        if out.len() != self.routing.len() {
            return Err(Error::LengthMismatch {
                what: "gather output",
                expected: self.routing.len(),
                actual: out.len(),
            });
        }
        self.stage(ctx, values)?;
        ctx.sync()?;
        out.copy_from_slice(&self.landed());
        Ok(())
    }

    /// The values gathered by the last `sync` after [`RemoteGather::stage`]
    pub fn landed(&self) -> RwLockReadGuard<'_, Vec<f64>> {
        self.landing.read()
    }

    /// Deregisters the source buffer, effective at the next `sync`.
    pub fn release<C: Bsp>(self, ctx: &mut C) -> Result<()> {
        ctx.pop_reg(self.reg)
    }
}
