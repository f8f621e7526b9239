//! Ownership tables and the routing arrays resolved from them
//!
//! The ownership table of a distributed vector answers "which processor
//! stores global component `g`, and at which local slot". Keeping the full
//! table on every processor costs O(n) memory each, so the collective
//! [`OwnershipTable`] stores it cyclically: the entry for `g` lives on
//! processor `g mod p` at position `g div p`. Resolving a set of global
//! indices then takes one batched remote read against those homes.

use std::sync::Arc;

use tracing::debug;

use crate::bsp::{nloc, Bsp, Buffer};
use crate::dist::VectorDistribution;
use crate::error::{try_alloc, Error, Result};

const UNOWNED: usize = usize::MAX;

/// An (owner, local slot) claim for one global index, sent to its cyclic home
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Claim {
    pub global: usize,
    pub owner: usize,
    pub offset: usize,
}

/// Where each referenced global index lives: for local position `i`, the
/// component is stored on processor `owner(i)` at local slot `offset(i)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing {
    owner: Arc<[usize]>,
    offset: Arc<[usize]>,
}

impl Routing {
    /// Create from parallel owner/offset arrays
    ///
    /// # Panics
    ///
    /// Panics if the arrays differ in length.
    pub fn new(owner: Vec<usize>, offset: Vec<usize>) -> Self {
        assert_eq!(owner.len(), offset.len(), "owner and offset arrays must match");
        Self {
            owner: owner.into(),
            offset: offset.into(),
        }
    }

    /// Number of resolved positions
    pub fn len(&self) -> usize {
        self.owner.len()
    }

    /// Whether nothing was resolved
    pub fn is_empty(&self) -> bool {
        self.owner.is_empty()
    }

    /// Owning processor of position `i`
    pub fn owner(&self, i: usize) -> usize {
        self.owner[i]
    }

    /// Local slot on the owner of position `i`
    pub fn offset(&self, i: usize) -> usize {
        self.offset[i]
    }

    /// All owners
    pub fn owners(&self) -> &[usize] {
        &self.owner
    }

    /// All offsets
    pub fn offsets(&self) -> &[usize] {
        &self.offset
    }

    /// Whether position `i` maps to local slot `i` of processor `pid` for
    /// every `i`, so reading through the routing is a plain local copy.
    pub fn is_identity_on(&self, pid: usize) -> bool {
        self.owner.iter().all(|&q| q == pid) && self.offset.iter().enumerate().all(|(i, &o)| o == i)
    }

    pub(crate) fn shared(&self) -> (Arc<[usize]>, Arc<[usize]>) {
        (Arc::clone(&self.owner), Arc::clone(&self.offset))
    }
}

/// A complete ownership table held by one processor.
///
/// This is what processor 0 derives while reading a vector distribution
/// file, and a convenient oracle for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalOwnership {
    nprocs: usize,
    owner: Vec<usize>,
    offset: Vec<usize>,
}

impl GlobalOwnership {
    /// Number local slots per processor in increasing global order.
    pub fn from_owners(owners: &[usize], nprocs: usize) -> Result<Self> {
        let mut counts = vec![0usize; nprocs];
        let mut offset = try_alloc("ownership offsets", owners.len(), 0usize)?;
        for (g, &q) in owners.iter().enumerate() {
            if q >= nprocs {
                return Err(Error::InvalidProcessor { pid: q, nprocs });
            }
            offset[g] = counts[q];
            counts[q] += 1;
        }
        Ok(Self {
            nprocs,
            owner: owners.to_vec(),
            offset,
        })
    }

    /// Global vector length
    pub fn global_len(&self) -> usize {
        self.owner.len()
    }

    /// Number of components stored by each processor
    pub fn local_lengths(&self) -> Vec<usize> {
        let mut counts = vec![0; self.nprocs];
        for &q in &self.owner {
            counts[q] += 1;
        }
        counts
    }

    /// Owner and local slot of global index `g`
    pub fn locate(&self, g: usize) -> Option<(usize, usize)> {
        Some((*self.owner.get(g)?, self.offset[g]))
    }

    /// Pure lookup of every index in `globals`
    pub fn resolve(&self, globals: &[usize]) -> Result<Routing> {
        let mut owner = Vec::with_capacity(globals.len());
        let mut offset = Vec::with_capacity(globals.len());
        for &g in globals {
            let (q, o) = self.locate(g).ok_or(Error::IndexOutOfRange {
                index: g,
                n: self.owner.len(),
            })?;
            owner.push(q);
            offset.push(o);
        }
        Ok(Routing::new(owner, offset))
    }
}

/// The cyclically distributed ownership table of one vector.
///
/// Built once, collectively, and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipTable {
    n: usize,
    nprocs: usize,
    pid: usize,
    /// Owner of global index `k * nprocs + pid`
    owner: Vec<usize>,
    /// Local slot of global index `k * nprocs + pid`
    offset: Vec<usize>,
}

impl OwnershipTable {
    /// Builds the table from every processor's local distribution.
    ///
    /// Each processor sends an (owner, slot) claim for each of its global
    /// indices to the index's cyclic home; the homes check that every index
    /// is claimed exactly once.
    pub fn build<C: Bsp>(ctx: &mut C, dist: &VectorDistribution) -> Result<Self> {
        let (p, s, n) = (ctx.nprocs(), ctx.pid(), dist.global_len());

        for (i, &g) in dist.index().iter().enumerate() {
            if g >= n {
                return Err(Error::IndexOutOfRange { index: g, n });
            }
            ctx.send(
                g % p,
                Claim {
                    global: g,
                    owner: s,
                    offset: i,
                },
            )?;
        }
        ctx.sync()?;

        let claims = ctx.move_messages::<Claim>()?;
        Self::from_claims(n, p, s, claims)
    }

    /// Assembles this processor's part of the table from the claims sent to it.
    pub(crate) fn from_claims(n: usize, p: usize, s: usize, claims: Vec<Claim>) -> Result<Self> {
        let np = nloc(p, s, n);
        let mut owner = try_alloc("ownership table", np, UNOWNED)?;
        let mut offset = try_alloc("ownership table", np, UNOWNED)?;

        for c in claims {
            if c.global >= n {
                return Err(Error::IndexOutOfRange { index: c.global, n });
            }
            let k = c.global / p;
            if owner[k] != UNOWNED {
                return Err(Error::DuplicateOwner { index: c.global });
            }
            owner[k] = c.owner;
            offset[k] = c.offset;
        }

        if let Some(k) = owner.iter().position(|&q| q == UNOWNED) {
            return Err(Error::Unowned { index: k * p + s });
        }

        Ok(Self {
            n,
            nprocs: p,
            pid: s,
            owner,
            offset,
        })
    }

    /// Global vector length
    pub fn global_len(&self) -> usize {
        self.n
    }

    /// Number of processors the table is spread over
    pub fn nprocs(&self) -> usize {
        self.nprocs
    }

    /// The locally held entries, as (global index, owner, slot)
    pub fn local_entries(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.owner
            .iter()
            .zip(&self.offset)
            .enumerate()
            .map(move |(k, (&q, &o))| (k * self.nprocs + self.pid, q, o))
    }

    /// Resolves global indices to (owner, slot) pairs.
    ///
    /// Collective: every processor must call it, each with its own list.
    /// Takes two supersteps.
    pub fn resolve<C: Bsp>(&self, ctx: &mut C, globals: &[usize]) -> Result<Routing> {
        let p = self.nprocs;
        if let Some(&g) = globals.iter().find(|&&g| g >= self.n) {
            return Err(Error::IndexOutOfRange { index: g, n: self.n });
        }

        let homes: Arc<[usize]> = globals.iter().map(|&g| g % p).collect();
        let slots: Arc<[usize]> = globals.iter().map(|&g| g / p).collect();

        let owner_table = Buffer::from_vec(self.owner.clone());
        let offset_table = Buffer::from_vec(self.offset.clone());
        let owner_reg = ctx.push_reg(&owner_table);
        let offset_reg = ctx.push_reg(&offset_table);
        ctx.sync()?;

        let owners = Buffer::filled("routing owners", globals.len(), UNOWNED)?;
        let offsets = Buffer::filled("routing offsets", globals.len(), UNOWNED)?;
        ctx.get_indexed(owner_reg, Arc::clone(&homes), Arc::clone(&slots), &owners)?;
        ctx.get_indexed(offset_reg, homes, slots, &offsets)?;
        ctx.pop_reg(owner_reg)?;
        ctx.pop_reg(offset_reg)?;
        ctx.sync()?;

        let owner = owners.to_vec();
        if let Some(i) = owner.iter().position(|&q| q == UNOWNED) {
            return Err(Error::Unowned { index: globals[i] });
        }
        debug!(
            pid = ctx.pid(),
            resolved = globals.len(),
            "resolved global indices"
        );
        Ok(Routing::new(owner, offsets.to_vec()))
    }
}
