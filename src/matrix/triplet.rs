//! Coordinate-format nonzeros

/// One nonzero `value` at global position (`row`, `col`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triplet<T> {
    /// Global row index
    pub row: usize,
    /// Global column index
    pub col: usize,
    /// Numerical value
    pub value: T,
}

impl<T> Triplet<T> {
    /// Create a triplet
    pub fn new(row: usize, col: usize, value: T) -> Self {
        Self { row, col, value }
    }
}

/// Sort triplets by (row, col); used to compare nonzero multisets.
pub fn sort_triplets<T>(triplets: &mut [Triplet<T>]) {
    triplets.sort_by(|a, b| (a.row, a.col).cmp(&(b.row, b.col)));
}
