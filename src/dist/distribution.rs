//! Which global vector components a processor stores

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The local view of a distributed dense vector of global length `n`:
/// local slot `i` stores global component `index[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorDistribution {
    n: usize,
    index: Vec<usize>,
}

impl VectorDistribution {
    /// Create from the list of global indices stored locally, in slot order.
    ///
    /// Consistency across processors (every index owned exactly once) is
    /// checked when the ownership table is built.
    pub fn new(n: usize, index: Vec<usize>) -> Self {
        Self { n, index }
    }

    /// The local slots of processor `pid` when `owners[g]` names the owner
    /// of every global index `g`. Slots are numbered in increasing global
    /// order, the convention of the vector distribution file.
    pub fn from_owners(pid: usize, owners: &[usize]) -> Self {
        let index = owners
            .iter()
            .enumerate()
            .filter(|&(_, &owner)| owner == pid)
            .map(|(g, _)| g)
            .collect();
        Self::new(owners.len(), index)
    }

    /// Contiguous blocks of `ceil(n / p)` components
    pub fn block(n: usize, p: usize, pid: usize) -> Self {
        Self::from_owners(pid, &block_owners(n, p))
    }

    /// Component `g` on processor `g mod p`
    pub fn cyclic(n: usize, p: usize, pid: usize) -> Self {
        Self::from_owners(pid, &cyclic_owners(n, p))
    }

    /// Global vector length
    pub fn global_len(&self) -> usize {
        self.n
    }

    /// Number of local components
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether this processor stores no components
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Global index of every local slot
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Extracts the local components of a globally known vector
    pub fn restrict(&self, global: &[f64]) -> Vec<f64> {
        self.index.iter().map(|&g| global[g]).collect()
    }
}

fn check_nprocs(p: usize) {
    assert!(p > 0, "an owner table needs at least one processor");
}

/// Owner table for the block distribution
///
/// # Panics
///
/// Panics if `p == 0`, as do the other owner tables.
pub fn block_owners(n: usize, p: usize) -> Vec<usize> {
    check_nprocs(p);
    let b = if n % p == 0 { n / p } else { n / p + 1 };
    (0..n).map(|g| g / b.max(1)).collect()
}

/// Owner table for the cyclic distribution
pub fn cyclic_owners(n: usize, p: usize) -> Vec<usize> {
    check_nprocs(p);
    (0..n).map(|g| g % p).collect()
}

/// Owner table assigning every index to a uniformly random processor
pub fn random_owners(n: usize, p: usize, seed: u64) -> Vec<usize> {
    check_nprocs(p);
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..p)).collect()
}
