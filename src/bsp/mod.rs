//! Bulk Synchronous Parallel primitives
//!
//! Every cross-processor data movement in the solver is built from the
//! operations of the [`Bsp`] trait: a superstep barrier ([`Bsp::sync`]),
//! remote writes into registered buffers ([`Bsp::put`]), remote reads
//! ([`Bsp::get`], [`Bsp::get_indexed`]) and a message queue
//! ([`Bsp::send`], [`Bsp::move_messages`]).
//!
//! Nothing issued in a superstep is visible to another processor before the
//! next `sync`. Registration and deregistration are collective: every
//! processor must register and deregister its buffers in the same order.
//!
//! [`ThreadedContext`] implements the trait for P ranks running as threads
//! of one process; [`run`] launches them.

mod barrier;
mod buffer;
mod context;
mod runner;

pub use barrier::AbortableBarrier;
pub use buffer::{Buffer, Element};
pub use context::{Machine, ThreadedContext};
pub use runner::run;

use std::sync::Arc;

use crate::error::{Error, Result};

/// Handle of a registered buffer.
///
/// Ids are handed out sequentially on each processor, so the n-th
/// registration refers to the same logical buffer everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegId(pub(crate) usize);

/// The operations a processor can perform on the BSP machine.
pub trait Bsp {
    /// Rank of this processor, `0 <= pid < nprocs`
    fn pid(&self) -> usize;

    /// Number of processors
    fn nprocs(&self) -> usize;

    /// Number of completed supersteps
    fn superstep(&self) -> usize;

    /// Ends the current superstep.
    ///
    /// Blocks until every processor arrives, then serves the staged reads,
    /// applies the staged writes and delivers the queued messages.
    fn sync(&mut self) -> Result<()>;

    /// Registers `buffer` for remote access, effective after the next `sync`.
    fn push_reg<T: Element>(&mut self, buffer: &Buffer<T>) -> RegId;

    /// Deregisters a buffer, effective at the end of the next `sync`.
    fn pop_reg(&mut self, reg: RegId) -> Result<()>;

    /// Stages a write of `src` into buffer `reg` of processor `pid` at `offset`.
    fn put<T: Element>(&mut self, pid: usize, src: &[T], reg: RegId, offset: usize) -> Result<()>;

    /// Stages a read of `len` elements from buffer `reg` of processor `pid`
    /// into `dst[dst_offset..]`.
    fn get<T: Element>(
        &mut self,
        pid: usize,
        reg: RegId,
        offset: usize,
        len: usize,
        dst: &Buffer<T>,
        dst_offset: usize,
    ) -> Result<()>;

    /// Stages a gather: `dst[i] = reg@owners[i][offsets[i]]` for every `i`.
    fn get_indexed<T: Element>(
        &mut self,
        reg: RegId,
        owners: Arc<[usize]>,
        offsets: Arc<[usize]>,
        dst: &Buffer<T>,
    ) -> Result<()>;

    /// Queues `message` for processor `pid`; readable there after the next `sync`.
    fn send<M: Send + 'static>(&mut self, pid: usize, message: M) -> Result<()>;

    /// Drains the messages delivered by the last `sync`, ordered by sender
    /// and, per sender, in send order. Fails with `Error::MessageType`,
    /// draining nothing, if any message is not an `M`.
    fn move_messages<M: 'static>(&mut self) -> Result<Vec<M>>;

    /// Number of undrained messages
    fn queue_len(&self) -> usize;

    /// Aborts the whole run. Returns the error the caller should propagate.
    fn abort(&self, reason: &str) -> Error;
}

/// Number of global indices in `0..n` whose cyclic home is processor `s`,
/// i.e. `|{ g < n : g mod p == s }|`.
pub fn nloc(p: usize, s: usize, n: usize) -> usize {
    (n + p - s - 1) / p
}

pub(crate) fn check_pid(pid: usize, nprocs: usize) -> Result<()> {
    if pid < nprocs {
        Ok(())
    } else {
        Err(Error::InvalidProcessor { pid, nprocs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nloc() {
        assert_eq!(nloc(3, 0, 10), 4);
        assert_eq!(nloc(3, 1, 10), 3);
        assert_eq!(nloc(3, 2, 10), 3);
        assert_eq!(nloc(4, 3, 0), 0);
        let total: usize = (0..5).map(|s| nloc(5, s, 23)).sum();
        assert_eq!(total, 23);
    }

    #[test]
    fn test_check_pid() {
        assert!(check_pid(1, 2).is_ok());
        assert!(matches!(
            check_pid(2, 2),
            Err(Error::InvalidProcessor { pid: 2, nprocs: 2 })
        ));
    }
}
