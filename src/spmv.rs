//! Distributed sparse matrix-vector multiplication
//!
//! Every processor holds an arbitrary subset of the nonzeros of a square
//! matrix, and the input vector `v` and output vector `u` are distributed
//! independently of the matrix and of each other. Matrix columns are always
//! resolved against the input vector's ownership table and matrix rows
//! against the output vector's.
//!
//! One multiply takes two supersteps:
//!
//! 1. gather the `v` components of the local columns,
//! 2. scan the local nonzeros once, then send each local row sum to the
//!    owner of the row's `u` component, where the sums are accumulated.

use std::time::Instant;

use tracing::{debug, trace};

use crate::bsp::Bsp;
use crate::dist::{OwnershipTable, RemoteGather, Routing};
use crate::error::{try_alloc, Error, Result};
use crate::matrix::LocalMatrix;

/// Partial row sum addressed to the owner of the row's output component
#[derive(Debug, Clone, Copy, PartialEq)]
struct RowContribution {
    slot: usize,
    value: f64,
}

/// A multiply with its communication pattern resolved once
pub struct SpmvPlan<M> {
    matrix: M,
    input: RemoteGather,
    output: Routing,
    output_len: usize,
    sums: Vec<f64>,
}

impl<M: LocalMatrix<f64>> SpmvPlan<M> {
    /// Resolves the local columns against `v`'s ownership and the local
    /// rows against `u`'s.
    ///
    /// `v_len` and `u_len` are the numbers of local components of the two
    /// vectors on this processor. Collective, five supersteps.
    pub fn new<C: Bsp>(
        ctx: &mut C,
        matrix: M,
        v_table: &OwnershipTable,
        v_len: usize,
        u_table: &OwnershipTable,
        u_len: usize,
    ) -> Result<Self> {
        let start = Instant::now();
        if v_table.global_len() != u_table.global_len() {
            return Err(Error::NotSquare {
                rows: u_table.global_len(),
                cols: v_table.global_len(),
            });
        }

        let columns = v_table.resolve(ctx, matrix.col_index())?;
        let output = u_table.resolve(ctx, matrix.row_index())?;
        let input = RemoteGather::new(ctx, columns, v_len)?;
        let sums = try_alloc("row sums", matrix.nrows(), 0.0)?;

        debug!(
            pid = ctx.pid(),
            nnz = matrix.nnz(),
            rows = matrix.nrows(),
            cols = matrix.ncols(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "spmv plan ready"
        );
        Ok(Self {
            matrix,
            input,
            output,
            output_len: u_len,
            sums,
        })
    }

    /// The local nonzeros
    pub fn matrix(&self) -> &M {
        &self.matrix
    }

    /// Computes `u = A·v`. Collective, two supersteps.
    ///
    /// `v` and `u` are this processor's local components.
    pub fn multiply<C: Bsp>(&mut self, ctx: &mut C, v: &[f64], u: &mut [f64]) -> Result<()> {
        if u.len() != self.output_len {
            return Err(Error::LengthMismatch {
                what: "spmv output",
                expected: self.output_len,
                actual: u.len(),
            });
        }

        self.input.stage(ctx, v)?;
        ctx.sync()?;

        self.sums.iter_mut().for_each(|s| *s = 0.0);
        self.matrix.zax(&self.input.landed(), &mut self.sums);

        for (i, &value) in self.sums.iter().enumerate() {
            ctx.send(
                self.output.owner(i),
                RowContribution {
                    slot: self.output.offset(i),
                    value,
                },
            )?;
        }
        ctx.sync()?;

        u.iter_mut().for_each(|x| *x = 0.0);
        let contributions = ctx.move_messages::<RowContribution>()?;
        trace!(
            pid = ctx.pid(),
            received = contributions.len(),
            "accumulating row sums"
        );
        for c in contributions {
            let capacity = u.len();
            let slot = u.get_mut(c.slot).ok_or(Error::OutOfBounds {
                pid: ctx.pid(),
                offset: c.slot,
                len: 1,
                capacity,
            })?;
            *slot += c.value;
        }
        Ok(())
    }

    /// Deregisters the input buffer, effective at the next `sync`.
    pub fn release<C: Bsp>(self, ctx: &mut C) -> Result<()> {
        self.input.release(ctx)
    }
}
