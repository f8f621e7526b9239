//! Scattering file contents read by processor 0 over the machine

use std::sync::Arc;

use tracing::{debug, info};

use crate::bsp::{nloc, Bsp, Buffer};
use crate::dist::ownership::Claim;
use crate::dist::{GlobalOwnership, OwnershipTable, VectorDistribution};
use crate::error::{try_alloc, try_with_capacity, Error, Result};
use crate::io::{MatrixFile, VectorFile};
use crate::matrix::Triplet;

const ROOT: usize = 0;

#[derive(Debug, Clone, Copy)]
struct MatrixHeader {
    n: usize,
    nz: usize,
}

#[derive(Debug, Clone, Copy)]
struct VectorHeader {
    n: usize,
    with_values: bool,
}

/// A global index and the local slot its owner stores it in
#[derive(Debug, Clone, Copy)]
struct Placement {
    global: usize,
    offset: usize,
}

/// The local part of a vector read from a distribution file
#[derive(Debug, Clone)]
pub struct DistributedVector {
    pub distribution: VectorDistribution,
    pub table: OwnershipTable,
    /// Local values, when the file embeds them
    pub values: Option<Vec<f64>>,
}

fn root_file<'a, F>(file: Option<&'a F>, what: &str) -> Result<&'a F> {
    file.ok_or_else(|| Error::Config(format!("processor {} was given no {} to distribute", ROOT, what)))
}

fn single_message<M: 'static>(ctx: &mut impl Bsp, what: &'static str) -> Result<M> {
    let mut messages = ctx.move_messages::<M>()?;
    if messages.len() != 1 {
        return Err(Error::LengthMismatch {
            what,
            expected: 1,
            actual: messages.len(),
        });
    }
    Ok(messages.remove(0))
}

/// Ships every processor its nonzeros from the file held by processor 0.
///
/// Only processor 0's `file` is consulted. The nonzeros go out one
/// destination per superstep, which bounds the message buffers by the
/// largest local part. Returns the global size and the local triplets.
/// Collective, `p + 1` supersteps.
pub fn distribute_matrix<C: Bsp>(ctx: &mut C, file: Option<&MatrixFile>) -> Result<(usize, Vec<Triplet<f64>>)> {
    let (p, s) = (ctx.nprocs(), ctx.pid());

    let file = if s == ROOT {
        let file = root_file(file, "matrix")?;
        if file.nprocs != p {
            return Err(Error::ProcessorMismatch {
                declared: file.nprocs,
                actual: p,
            });
        }
        if file.rows != file.cols {
            return Err(Error::NotSquare {
                rows: file.rows,
                cols: file.cols,
            });
        }
        for q in 0..p {
            ctx.send(
                q,
                MatrixHeader {
                    n: file.rows,
                    nz: file.part(q).len(),
                },
            )?;
        }
        Some(file)
    } else {
        None
    };
    ctx.sync()?;
    let header: MatrixHeader = single_message(ctx, "matrix header")?;

    let mut triplets = try_with_capacity("local nonzeros", header.nz)?;
    for q in 0..p {
        if let Some(file) = file {
            for &t in file.part(q) {
                ctx.send(q, t)?;
            }
        }
        ctx.sync()?;
        if s == q {
            triplets.extend(ctx.move_messages::<Triplet<f64>>()?);
        }
    }
    if triplets.len() != header.nz {
        return Err(Error::LengthMismatch {
            what: "local nonzeros",
            expected: header.nz,
            actual: triplets.len(),
        });
    }

    debug!(pid = s, n = header.n, nz = header.nz, "received matrix part");
    if s == ROOT {
        info!(n = header.n, nprocs = p, "matrix distributed");
    }
    Ok((header.n, triplets))
}

/// Builds the distribution, its ownership table and the local values of a
/// vector from the file held by processor 0.
///
/// Processor 0 numbers the local slots of every owner in increasing global
/// order and parks each (owner, slot) pair at the index's cyclic home, one
/// block of `ceil(n / p)` indices per superstep. The homes then forward
/// every index to its owner. Embedded values are fetched by the owners from
/// processor 0 with one batched remote read. Collective, `p + 4` supersteps.
pub fn distribute_vector<C: Bsp>(ctx: &mut C, file: Option<&VectorFile>) -> Result<DistributedVector> {
    let (p, s) = (ctx.nprocs(), ctx.pid());

    let root = if s == ROOT {
        let file = root_file(file, "vector")?;
        if file.nprocs != p {
            return Err(Error::ProcessorMismatch {
                declared: file.nprocs,
                actual: p,
            });
        }
        let ownership = GlobalOwnership::from_owners(&file.owners, p)?;
        for q in 0..p {
            ctx.send(
                q,
                VectorHeader {
                    n: file.n,
                    with_values: file.values.is_some(),
                },
            )?;
        }
        Some((file, ownership))
    } else {
        None
    };
    ctx.sync()?;
    let header: VectorHeader = single_message(ctx, "vector header")?;
    let n = header.n;

    // Park the ownership at the cyclic homes
    let block = if n % p == 0 { n / p } else { n / p + 1 };
    let mut claims = try_with_capacity("ownership claims", nloc(p, s, n))?;
    for q in 0..p {
        if let Some((_, ownership)) = &root {
            for g in (q * block..(q + 1) * block).take_while(|&g| g < n) {
                if let Some((owner, offset)) = ownership.locate(g) {
                    ctx.send(
                        g % p,
                        Claim {
                            global: g,
                            owner,
                            offset,
                        },
                    )?;
                }
            }
        }
        ctx.sync()?;
        claims.extend(ctx.move_messages::<Claim>()?);
    }
    let table = OwnershipTable::from_claims(n, p, s, claims)?;

    // Forward each index to its owner
    for (global, owner, offset) in table.local_entries() {
        ctx.send(owner, Placement { global, offset })?;
    }
    ctx.sync()?;
    let placements = ctx.move_messages::<Placement>()?;
    let capacity = placements.len();
    let mut index = try_alloc("vector index", capacity, usize::MAX)?;
    for placement in placements {
        let slot = index.get_mut(placement.offset).ok_or(Error::OutOfBounds {
            pid: s,
            offset: placement.offset,
            len: 1,
            capacity,
        })?;
        if *slot != usize::MAX {
            return Err(Error::DuplicateOwner {
                index: placement.global,
            });
        }
        *slot = placement.global;
    }
    let distribution = VectorDistribution::new(n, index);

    let values = if header.with_values {
        let all = match &root {
            Some((file, _)) => Buffer::from_vec(file.values.clone().unwrap_or_default()),
            None => Buffer::from_vec(Vec::new()),
        };
        let reg = ctx.push_reg(&all);
        ctx.sync()?;

        let local = Buffer::filled("vector values", distribution.len(), 0.0)?;
        let owners: Arc<[usize]> = vec![ROOT; distribution.len()].into();
        let offsets: Arc<[usize]> = distribution.index().into();
        ctx.get_indexed(reg, owners, offsets, &local)?;
        ctx.pop_reg(reg)?;
        ctx.sync()?;
        Some(local.to_vec())
    } else {
        None
    };

    debug!(pid = s, n, local = distribution.len(), "received vector part");
    Ok(DistributedVector {
        distribution,
        table,
        values,
    })
}
