//! Utilities for converting between our matrix formats and sprs

use std::ops::AddAssign;

use num_traits::Num;
use sprs::{CsMat, TriMat};

use crate::matrix::{CrsMatrix, Triplet};

/// Converts our local CRS matrix to a sprs CsMat over local slots
///
/// Duplicate positions are summed into one entry.
pub fn to_sprs_csr<T>(matrix: &CrsMatrix<T>) -> CsMat<T>
where
    T: Copy + Num + Default + AddAssign,
{
    let shape = (matrix.row_index.len(), matrix.col_index.len());
    let mut tri = TriMat::with_capacity(shape, matrix.values.len());
    for row in 0..shape.0 {
        for (col, &value) in matrix.row_iter(row) {
            tri.add_triplet(row, col, value);
        }
    }
    tri.to_csr()
}

/// Converts a sprs CsMat over local slots back to our CRS format
///
/// `row_index` and `col_index` give the global index of every local slot.
pub fn from_sprs_csr<T>(matrix: CsMat<T>, row_index: Vec<usize>, col_index: Vec<usize>) -> CrsMatrix<T>
where
    T: Copy + Num + Default,
{
    // Ensure matrix is in CSR format
    let matrix = if matrix.is_csr() {
        matrix
    } else {
        matrix.to_csr()
    };

    let (indptr, indices, data) = matrix.into_raw_storage();
    CrsMatrix::new(indptr, indices, data, row_index, col_index)
}

/// Assembles global triplets into an `n × n` sprs CSR matrix, summing
/// duplicates
pub fn triplets_to_sprs<T>(n: usize, triplets: &[Triplet<T>]) -> CsMat<T>
where
    T: Copy + Num + Default + AddAssign,
{
    let mut tri = TriMat::with_capacity((n, n), triplets.len());
    for t in triplets {
        tri.add_triplet(t.row, t.col, t.value);
    }
    tri.to_csr()
}
