//! Error types shared by every layer of the solver

use std::path::PathBuf;

use crate::bsp::RegId;

/// Errors raised while setting up or running a distributed solve.
///
/// Configuration and distribution errors are detected locally by one
/// processor; the BSP runner turns them into a collective abort so the
/// remaining processors observe [`Error::Aborted`] instead of deadlocking.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Generic configuration problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// Input was prepared for a different number of processors.
    #[error("input is distributed over {declared} processors, but the run has {actual}")]
    ProcessorMismatch { declared: usize, actual: usize },

    /// The matrix must be square for CG.
    #[error("matrix is not square ({rows} x {cols})")]
    NotSquare { rows: usize, cols: usize },

    /// A global index does not fit the declared vector length.
    #[error("global index {index} is out of range for length {n}")]
    IndexOutOfRange { index: usize, n: usize },

    /// No processor claimed a global index.
    #[error("global index {index} has no owner")]
    Unowned { index: usize },

    /// More than one processor (or slot) claimed a global index.
    #[error("global index {index} is owned more than once")]
    DuplicateOwner { index: usize },

    /// A processor id outside `0..nprocs`.
    #[error("processor {pid} does not exist (nprocs = {nprocs})")]
    InvalidProcessor { pid: usize, nprocs: usize },

    /// Remote access to a buffer that is not registered on the target.
    #[error("buffer {reg:?} is not registered on processor {pid}")]
    NotRegistered { reg: RegId, pid: usize },

    /// Remote access with a different element type than was registered.
    #[error("buffer {reg:?} on processor {pid} holds a different element type")]
    TypeMismatch { reg: RegId, pid: usize },

    /// Processors registered a different number of buffers.
    #[error("registration sequence differs: processor {pid} has {found} buffers, expected {expected}")]
    RegistrationMismatch {
        pid: usize,
        expected: usize,
        found: usize,
    },

    /// Remote access beyond the end of a registered buffer.
    #[error("access of {len} elements at offset {offset} exceeds buffer of length {capacity} on processor {pid}")]
    OutOfBounds {
        pid: usize,
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// The message queue held a message of another type.
    #[error("message queue holds a message of an unexpected type")]
    MessageType,

    /// Two arrays that must agree in length do not.
    #[error("{what}: expected length {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Local allocation failed.
    #[error("failed to allocate {elements} elements for {what}")]
    Allocation { what: &'static str, elements: usize },

    /// The run was aborted collectively.
    #[error("run aborted by processor {pid}: {reason}")]
    Aborted { pid: usize, reason: String },

    /// File could not be opened, read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed input file.
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The rank thread pool could not be created.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Allocates a vector of `len` copies of `value`, reporting failure as
/// [`Error::Allocation`] instead of aborting the process.
pub fn try_alloc<T: Clone>(what: &'static str, len: usize, value: T) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| Error::Allocation { what, elements: len })?;
    v.resize(len, value);
    Ok(v)
}

/// Allocates an empty vector with room for `capacity` elements.
pub fn try_with_capacity<T>(what: &'static str, capacity: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(capacity).map_err(|_| Error::Allocation {
        what,
        elements: capacity,
    })?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_alloc() {
        let v = try_alloc("test", 4, 1.5f64).unwrap();
        assert_eq!(v, vec![1.5; 4]);
    }

    #[test]
    fn test_allocation_failure_is_reported() {
        let err = try_with_capacity::<u64>("huge", usize::MAX / 2).unwrap_err();
        match err {
            Error::Allocation { what, elements } => {
                assert_eq!(what, "huge");
                assert_eq!(elements, usize::MAX / 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_error_messages() {
        let err = Error::ProcessorMismatch {
            declared: 4,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "input is distributed over 4 processors, but the run has 2"
        );
    }
}
