//! Conversion functions between local matrix formats

use crate::matrix::{CrsMatrix, IcrsMatrix};
use crate::utils::exclusive_scan;
use num_traits::Num;

impl<T: Copy + Num> From<&IcrsMatrix<T>> for CrsMatrix<T> {
    /// Expands the column increments into explicit column slots
    fn from(m: &IcrsMatrix<T>) -> Self {
        // Count non-zeros per row while decoding columns
        let mut row_counts = vec![0; m.nrows];
        let mut col_idx = Vec::with_capacity(m.nnz());
        for e in m.cursor() {
            row_counts[e.row] += 1;
            col_idx.push(e.col);
        }

        // Compute row pointers via prefix sum
        let row_ptr = exclusive_scan(&row_counts);

        CrsMatrix::new(
            row_ptr,
            col_idx,
            m.values.clone(),
            m.row_index.clone(),
            m.col_index.clone(),
        )
    }
}

impl<T: Copy + Num> From<&CrsMatrix<T>> for IcrsMatrix<T> {
    /// Re-encodes explicit column slots as increments
    fn from(m: &CrsMatrix<T>) -> Self {
        let nrows = m.row_index.len();
        let ncols = m.col_index.len();
        let nz = m.values.len();

        // Steps are differences of flat positions row * ncols + col, so a
        // row boundary adds ncols once per row crossed, empty rows included
        let mut inc = Vec::with_capacity(nz + 1);
        let mut last = 0;
        for i in 0..nrows {
            for idx in m.row_ptr[i]..m.row_ptr[i + 1] {
                let pos = i * ncols + m.col_idx[idx];
                inc.push(pos - last);
                last = pos;
            }
        }
        inc.push(if nz == 0 { 0 } else { nrows * ncols - last });

        IcrsMatrix {
            nrows,
            ncols,
            row_index: m.row_index.clone(),
            col_index: m.col_index.clone(),
            values: m.values.clone(),
            inc,
        }
    }
}
