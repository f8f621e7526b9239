//! Incremental Compressed Row Storage (ICRS) with local indices
//!
//! Nonzeros are stored row by row, columns increasing inside a row. Instead
//! of absolute column indices, `inc[k]` holds the step in local column slot
//! from nonzero `k - 1` to nonzero `k`. A step that starts a new row has
//! `ncols` added to it, so a row ends exactly when the running column
//! counter reaches `ncols`. The array has one trailing entry,
//! `ncols - col(nz - 1)` (0 when there are no nonzeros), that closes the
//! last row.
//!
//! Stores built from triplets never have empty rows. A store converted from
//! CRS may: each empty row adds another `ncols` to the step that crosses it.
//!
//! A multiply is then one sequential pass over `values` and `inc` with a
//! single running counter.

use std::fmt;
use std::ops::AddAssign;

use num_traits::Num;

use crate::matrix::sort::sort_and_compress;
use crate::matrix::{LocalMatrix, Triplet};

/// A processor's local part of a sparse matrix in ICRS format
#[derive(Clone)]
pub struct IcrsMatrix<T> {
    /// Number of distinct global rows touched locally
    pub nrows: usize,

    /// Number of distinct global columns touched locally
    pub ncols: usize,

    /// Local row slot -> global row index
    pub row_index: Vec<usize>,

    /// Local column slot -> global column index
    pub col_index: Vec<usize>,

    /// Nonzero values, grouped by row and sorted by column within a row
    pub values: Vec<T>,

    /// Column increments (size: nnz + 1)
    pub inc: Vec<usize>,
}

impl<T> IcrsMatrix<T>
where
    T: Copy + Num,
{
    /// Converts local triplets with global indices in `0..n`.
    ///
    /// Duplicate positions are kept as separate nonzeros.
    ///
    /// # Panics
    ///
    /// Panics if a row or column index is `>= n`; bounds are validated
    /// when the triplets are read.
    pub fn build(triplets: Vec<Triplet<T>>, n: usize) -> Self {
        let c = sort_and_compress(triplets, n);
        let ncols = c.col_index.len();
        let nz = c.values.len();

        let mut inc = Vec::with_capacity(nz + 1);
        for k in 0..nz {
            let step = if k == 0 {
                c.cols[0]
            } else if c.rows[k] != c.rows[k - 1] {
                // Row boundary: jump past ncols, possibly moving left
                ncols + c.cols[k] - c.cols[k - 1]
            } else {
                c.cols[k] - c.cols[k - 1]
            };
            inc.push(step);
        }
        inc.push(if nz == 0 { 0 } else { ncols - c.cols[nz - 1] });

        Self {
            nrows: c.row_index.len(),
            ncols,
            row_index: c.row_index,
            col_index: c.col_index,
            values: c.values,
            inc,
        }
    }

    /// Number of stored nonzeros
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Sequential scan over the nonzeros in storage order
    pub fn cursor(&self) -> IcrsCursor<'_, T> {
        IcrsCursor::new(self)
    }

    /// Reconstructs the nonzeros with their global indices
    pub fn triplets(&self) -> Vec<Triplet<T>> {
        self.cursor()
            .map(|e| Triplet::new(self.row_index[e.row], self.col_index[e.col], e.value))
            .collect()
    }
}

/// One nonzero produced by [`IcrsCursor`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcrsEntry<T> {
    /// Local row slot
    pub row: usize,
    /// Local column slot
    pub col: usize,
    /// Value
    pub value: T,
    /// Whether this nonzero is the first of its row
    pub starts_row: bool,
}

/// Walks an [`IcrsMatrix`] by summing increments, without random access.
pub struct IcrsCursor<'a, T> {
    matrix: &'a IcrsMatrix<T>,
    k: usize,
    row: usize,
    col: usize,
    starts_row: bool,
}

impl<'a, T> IcrsCursor<'a, T> {
    fn new(matrix: &'a IcrsMatrix<T>) -> Self {
        let mut cursor = Self {
            matrix,
            k: 0,
            row: 0,
            col: matrix.inc.first().copied().unwrap_or(0),
            starts_row: true,
        };
        if !matrix.values.is_empty() {
            // Skip leading empty rows
            while cursor.col >= matrix.ncols {
                cursor.col -= matrix.ncols;
                cursor.row += 1;
            }
        }
        cursor
    }
}

impl<'a, T: Copy> Iterator for IcrsCursor<'a, T> {
    type Item = IcrsEntry<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let m = self.matrix;
        if self.k >= m.values.len() {
            return None;
        }

        let entry = IcrsEntry {
            row: self.row,
            col: self.col,
            value: m.values[self.k],
            starts_row: self.starts_row,
        };

        self.k += 1;
        self.col += m.inc[self.k];
        self.starts_row = false;
        while self.col >= m.ncols {
            self.col -= m.ncols;
            self.row += 1;
            self.starts_row = true;
        }

        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.matrix.values.len() - self.k;
        (left, Some(left))
    }
}

impl<T> LocalMatrix<T> for IcrsMatrix<T>
where
    T: Copy + Num + AddAssign,
{
    fn load(triplets: Vec<Triplet<T>>, n: usize) -> Self {
        IcrsMatrix::build(triplets, n)
    }

    fn nrows(&self) -> usize {
        self.nrows
    }

    fn ncols(&self) -> usize {
        self.ncols
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
        assert_eq!(x.len(), self.ncols, "x must have one entry per local column");
        assert_eq!(z.len(), self.nrows, "z must have one entry per local row");

        let values = &self.values;
        let inc = &self.inc;
        let mut k = 0;
        let mut j = inc[0];
        for zi in z.iter_mut() {
            let mut sum = T::zero();
            while j < self.ncols {
                sum += values[k] * x[j];
                k += 1;
                j += inc[k];
            }
            *zi += sum;
            j -= self.ncols;
        }
    }

    fn zxa(&self, x: &[T], z: &mut [T]) {
        assert_eq!(x.len(), self.nrows, "x must have one entry per local row");
        assert_eq!(z.len(), self.ncols, "z must have one entry per local column");

        for e in self.cursor() {
            z[e.col] += e.value * x[e.row];
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for IcrsMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IcrsMatrix {{")?;
        writeln!(f, "  local shape: {} × {}", self.nrows, self.ncols)?;
        writeln!(f, "  nnz: {}", self.values.len())?;
        let shown = 8.min(self.values.len());
        if shown > 0 {
            writeln!(f, "  values: {:?}", &self.values[..shown])?;
            writeln!(f, "  inc: {:?}", &self.inc[..shown + 1])?;
            if self.values.len() > shown {
                writeln!(f, "  ... ({} more)", self.values.len() - shown)?;
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::sort_triplets;

    //    [1 2 0]
    //    [0 3 0]
    //    [4 0 5]
    fn example() -> Vec<Triplet<f64>> {
        vec![
            Triplet::new(2, 2, 5.0),
            Triplet::new(0, 1, 2.0),
            Triplet::new(1, 1, 3.0),
            Triplet::new(2, 0, 4.0),
            Triplet::new(0, 0, 1.0),
        ]
    }

    #[test]
    fn test_increments() {
        let m = IcrsMatrix::build(example(), 3);
        assert_eq!(m.nrows, 3);
        assert_eq!(m.ncols, 3);
        assert_eq!(m.values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        // col 0, +1, new row to col 1 (3 + 1 - 1), new row to col 0 (3 + 0 - 1), +2, close
        assert_eq!(m.inc, vec![0, 1, 3, 2, 2, 1]);
    }

    #[test]
    fn test_prefix_sums_reconstruct_columns() {
        let m = IcrsMatrix::build(example(), 3);
        let mut j = 0;
        let mut cols = Vec::new();
        for &step in &m.inc[..m.nnz()] {
            j += step;
            if j >= m.ncols {
                j -= m.ncols;
            }
            cols.push(j);
        }
        assert_eq!(cols, vec![0, 1, 1, 0, 2]);
    }

    #[test]
    fn test_cursor_flags_row_starts() {
        let m = IcrsMatrix::build(example(), 3);
        let entries: Vec<_> = m.cursor().collect();
        let starts: Vec<bool> = entries.iter().map(|e| e.starts_row).collect();
        assert_eq!(starts, vec![true, false, true, true, false]);
        let rows: Vec<usize> = entries.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![0, 0, 1, 2, 2]);
    }

    #[test]
    fn test_round_trip() {
        let mut original = example();
        let m = IcrsMatrix::build(original.clone(), 3);
        let mut replay = m.triplets();
        sort_triplets(&mut original);
        sort_triplets(&mut replay);
        assert_eq!(original, replay);
    }

    #[test]
    fn test_zax_and_zxa() {
        let m = IcrsMatrix::build(example(), 3);
        let mut z = vec![0.0; 3];
        m.zax(&[1.0, 1.0, 1.0], &mut z);
        assert_eq!(z, vec![3.0, 3.0, 9.0]);

        let mut zt = vec![0.0; 3];
        m.zxa(&[1.0, 2.0, 3.0], &mut zt);
        // Aᵀ · [1 2 3] = [1 + 12, 2 + 6, 15]
        assert_eq!(zt, vec![13.0, 8.0, 15.0]);
    }

    #[test]
    fn test_sparse_global_indices_compress() {
        let triplets = vec![Triplet::new(90, 17, 2.0), Triplet::new(3, 17, 1.0)];
        let m = IcrsMatrix::build(triplets, 100);
        assert_eq!(m.row_index, vec![3, 90]);
        assert_eq!(m.col_index, vec![17]);
        assert_eq!(m.inc, vec![0, 1, 1]);

        let mut z = vec![0.0; 2];
        m.zax(&[10.0], &mut z);
        assert_eq!(z, vec![10.0, 20.0]);
    }

    #[test]
    fn test_empty() {
        let m = IcrsMatrix::<f64>::build(Vec::new(), 10);
        assert_eq!(m.nrows, 0);
        assert_eq!(m.ncols, 0);
        assert_eq!(m.inc, vec![0]);
        assert_eq!(m.cursor().count(), 0);
        let mut z: Vec<f64> = Vec::new();
        m.zax(&[], &mut z);
    }

    #[test]
    fn test_duplicates_kept() {
        let triplets = vec![Triplet::new(0, 0, 1.0), Triplet::new(0, 0, 2.0)];
        let m = IcrsMatrix::build(triplets, 1);
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.inc, vec![0, 0, 1]);
        let mut z = vec![0.0];
        m.zax(&[1.0], &mut z);
        assert_eq!(z, vec![3.0]);
    }
}
