//! Counting-sort based conversion of local triplets
//!
//! Two stable counting-sort passes (by index mod radix, then by index div
//! radix) give a full sort by index in O(nz + sqrt(n)) time without
//! comparisons. The radix is the smallest power of two with
//! `radix * radix >= n`, which keeps both bin counts near sqrt(n).

use crate::matrix::Triplet;
use crate::utils::exclusive_scan;

/// Smallest power of two `r` with `r * r >= n`
pub fn radix_for(n: usize) -> usize {
    let mut radix = 1;
    while radix * radix < n {
        radix *= 2;
    }
    radix
}

/// Stable counting sort of `items` by `key`, where every key is `< nbins`.
///
/// # Panics
///
/// Panics if a key is `>= nbins`.
pub fn counting_sort<T, K>(items: &mut Vec<T>, nbins: usize, key: K)
where
    T: Copy,
    K: Fn(&T) -> usize,
{
    if items.len() < 2 {
        return;
    }

    // Count the elements in each bin
    let mut counts = vec![0; nbins];
    for item in items.iter() {
        counts[key(item)] += 1;
    }

    // Starting positions via prefix sum
    let mut start = exclusive_scan(&counts);

    let mut sorted = items.clone();
    for item in items.iter() {
        let bin = key(item);
        sorted[start[bin]] = *item;
        start[bin] += 1;
    }
    *items = sorted;
}

/// Full stable sort of `items` by an index key in `0..n`
pub fn radix_sort<T, K>(items: &mut Vec<T>, n: usize, key: K)
where
    T: Copy,
    K: Fn(&T) -> usize,
{
    let radix = radix_for(n);
    let nbins_div = (n + radix - 1) / radix;
    counting_sort(items, radix, |t| key(t) % radix);
    counting_sort(items, nbins_div.max(1), |t| key(t) / radix);
}

/// Local nonzeros ordered by row, then by column within each row
pub(crate) struct Compressed<T> {
    /// Local row slot per nonzero (non-decreasing)
    pub rows: Vec<usize>,
    /// Local column slot per nonzero (increasing within a row)
    pub cols: Vec<usize>,
    /// Values in the same order
    pub values: Vec<T>,
    /// Local row slot -> global row
    pub row_index: Vec<usize>,
    /// Local column slot -> global column
    pub col_index: Vec<usize>,
}

/// Sort triplets by column and compress the columns, then sort by row and
/// compress the rows.
///
/// # Panics
///
/// Panics if a row or column index is `>= n`.
pub(crate) fn sort_and_compress<T: Copy>(mut triplets: Vec<Triplet<T>>, n: usize) -> Compressed<T> {
    // Sort nonzeros by column index
    radix_sort(&mut triplets, n, |t| t.col);

    // Replace global column indices by local ones
    let mut col_index: Vec<usize> = Vec::new();
    for t in triplets.iter_mut() {
        if col_index.last() != Some(&t.col) {
            col_index.push(t.col);
        }
        t.col = col_index.len() - 1;
    }

    // Stable sort by row keeps the column order inside each row
    radix_sort(&mut triplets, n, |t| t.row);

    let mut row_index: Vec<usize> = Vec::new();
    let mut rows = Vec::with_capacity(triplets.len());
    let mut cols = Vec::with_capacity(triplets.len());
    let mut values = Vec::with_capacity(triplets.len());
    for t in &triplets {
        if row_index.last() != Some(&t.row) {
            row_index.push(t.row);
        }
        rows.push(row_index.len() - 1);
        cols.push(t.col);
        values.push(t.value);
    }

    Compressed {
        rows,
        cols,
        values,
        row_index,
        col_index,
    }
}
