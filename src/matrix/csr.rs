//! Compressed Sparse Row (CRS) storage with local indices

use std::fmt;
use std::ops::AddAssign;

use num_traits::Num;

use crate::matrix::sort::sort_and_compress;
use crate::matrix::{LocalMatrix, Triplet};
use crate::utils::exclusive_scan;

/// A processor's local part of a sparse matrix in CRS format
///
/// The CRS format stores the local nonzeros using three arrays:
/// - row_ptr: Array of size nrows + 1 containing indices into col_idx and values arrays
/// - col_idx: Array of size nnz containing local column slots
/// - values: Array of size nnz containing the non-zero values
///
/// Rows and columns are local slots; `row_index` and `col_index` map them
/// back to global indices.
#[derive(Clone)]
pub struct CrsMatrix<T> {
    /// Row pointers (size: nrows + 1)
    /// row_ptr[i] is the index in col_idx and values where row i starts
    pub row_ptr: Vec<usize>,

    /// Local column slot per nonzero
    pub col_idx: Vec<usize>,

    /// Non-zero values
    pub values: Vec<T>,

    /// Local row slot -> global row index
    pub row_index: Vec<usize>,

    /// Local column slot -> global column index
    pub col_index: Vec<usize>,
}

impl<T> CrsMatrix<T>
where
    T: Copy + Num,
{
    /// Creates a CRS matrix from its arrays
    ///
    /// # Panics
    ///
    /// Panics if the input arrays are inconsistent:
    /// - row_ptr.len() must be row_index.len() + 1
    /// - col_idx.len() must equal values.len()
    /// - the last row pointer must equal col_idx.len()
    /// - every column slot must be < col_index.len()
    pub fn new(
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
        row_index: Vec<usize>,
        col_index: Vec<usize>,
    ) -> Self {
        assert_eq!(
            row_ptr.len(),
            row_index.len() + 1,
            "row_ptr.len() must be nrows + 1"
        );
        assert_eq!(col_idx.len(), values.len(), "col_idx.len() must equal values.len()");
        assert_eq!(
            row_ptr[row_index.len()],
            col_idx.len(),
            "row_ptr[nrows] must equal col_idx.len()"
        );
        for &col in &col_idx {
            assert!(
                col < col_index.len(),
                "Column slot {} out of bounds (ncols = {})",
                col,
                col_index.len()
            );
        }

        Self {
            row_ptr,
            col_idx,
            values,
            row_index,
            col_index,
        }
    }

    /// Converts local triplets with global indices in `0..n`.
    ///
    /// # Panics
    ///
    /// Panics if a row or column index is `>= n`.
    pub fn build(triplets: Vec<Triplet<T>>, n: usize) -> Self {
        let c = sort_and_compress(triplets, n);

        // Count non-zeros per local row, then prefix sum
        let mut row_counts = vec![0; c.row_index.len()];
        for &row in &c.rows {
            row_counts[row] += 1;
        }
        let row_ptr = exclusive_scan(&row_counts);

        Self {
            row_ptr,
            col_idx: c.cols,
            values: c.values,
            row_index: c.row_index,
            col_index: c.col_index,
        }
    }

    /// Returns an iterator over the nonzeros of local row i
    ///
    /// Each item is a tuple (column slot, value)
    pub fn row_iter(&self, i: usize) -> impl Iterator<Item = (usize, &T)> {
        assert!(i < self.row_index.len(), "Row slot out of bounds");

        let start = self.row_ptr[i];
        let end = self.row_ptr[i + 1];

        self.col_idx[start..end]
            .iter()
            .zip(&self.values[start..end])
            .map(|(&col, val)| (col, val))
    }
}

impl<T> LocalMatrix<T> for CrsMatrix<T>
where
    T: Copy + Num + AddAssign,
{
    fn load(triplets: Vec<Triplet<T>>, n: usize) -> Self {
        CrsMatrix::build(triplets, n)
    }

    fn nrows(&self) -> usize {
        self.row_index.len()
    }

    fn ncols(&self) -> usize {
        self.col_index.len()
    }

    fn nnz(&self) -> usize {
        self.values.len()
    }

    fn row_index(&self) -> &[usize] {
        &self.row_index
    }

    fn col_index(&self) -> &[usize] {
        &self.col_index
    }

    fn zax(&self, x: &[T], z: &mut [T]) {
        assert_eq!(x.len(), self.ncols(), "x must have one entry per local column");
        assert_eq!(z.len(), self.nrows(), "z must have one entry per local row");

        for (i, zi) in z.iter_mut().enumerate() {
            let mut sum = T::zero();
            for (col, &val) in self.row_iter(i) {
                sum += val * x[col];
            }
            *zi += sum;
        }
    }

    fn zxa(&self, x: &[T], z: &mut [T]) {
        assert_eq!(x.len(), self.nrows(), "x must have one entry per local row");
        assert_eq!(z.len(), self.ncols(), "z must have one entry per local column");

        for (i, &xi) in x.iter().enumerate() {
            for (col, &val) in self.row_iter(i) {
                z[col] += val * xi;
            }
        }
    }
}

impl<T: fmt::Debug + Copy + Num> fmt::Debug for CrsMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CrsMatrix {{")?;
        writeln!(
            f,
            "  local shape: {} × {}",
            self.row_index.len(),
            self.col_index.len()
        )?;
        writeln!(f, "  nnz: {}", self.values.len())?;

        let max_rows_to_print = 5.min(self.row_index.len());
        for i in 0..max_rows_to_print {
            write!(f, "    row {} (global {}): ", i, self.row_index[i])?;
            for (col, val) in self.row_iter(i).take(5) {
                write!(f, "({}, {:?}) ", self.col_index[col], val)?;
            }
            let len = self.row_ptr[i + 1] - self.row_ptr[i];
            if len > 5 {
                write!(f, "... ({} more)", len - 5)?;
            }
            writeln!(f)?;
        }
        if self.row_index.len() > max_rows_to_print {
            writeln!(
                f,
                "    ... ({} more rows)",
                self.row_index.len() - max_rows_to_print
            )?;
        }

        write!(f, "}}")
    }
}
