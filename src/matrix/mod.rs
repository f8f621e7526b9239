// Local sparse storage formats

pub mod conversion;
pub mod csr;
pub mod icrs;
pub mod reference;
pub mod sort;
pub mod triplet;

pub use csr::CrsMatrix;
pub use icrs::{IcrsCursor, IcrsEntry, IcrsMatrix};
pub use reference::{reference_spmv, sequential_cg};
pub use triplet::{sort_triplets, Triplet};

use num_traits::Num;
use std::ops::AddAssign;

/// Trait for the local storage of a processor's nonzeros
///
/// Rows and columns are addressed by *local slots*: slot `i` stands for
/// global row `row_index()[i]`, slot `j` for global column `col_index()[j]`.
/// Only rows and columns that hold a local nonzero get a slot. The
/// distributed multiply depends on this interface only.
pub trait LocalMatrix<T>
where
    T: Copy + Num + AddAssign,
{
    /// Build from local triplets with global indices in `0..n`
    fn load(triplets: Vec<Triplet<T>>, n: usize) -> Self
    where
        Self: Sized;

    /// Number of local row slots
    fn nrows(&self) -> usize;

    /// Number of local column slots
    fn ncols(&self) -> usize;

    /// Number of local nonzeros
    fn nnz(&self) -> usize;

    /// Global row index of every local row slot
    fn row_index(&self) -> &[usize];

    /// Global column index of every local column slot
    fn col_index(&self) -> &[usize];

    /// `z += A·x`, with `x` indexed by column slot and `z` by row slot
    fn zax(&self, x: &[T], z: &mut [T]);

    /// `z += Aᵀ·x`, with `x` indexed by row slot and `z` by column slot
    fn zxa(&self, x: &[T], z: &mut [T]);
}
