//! Shared local arrays that can be registered for remote access

use std::any::Any;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{try_alloc, Error, Result};

/// Element types that can live in a registered buffer
pub trait Element: Copy + Send + Sync + 'static {}

impl<T: Copy + Send + Sync + 'static> Element for T {}

/// A processor-local array that other processors may read or write once it
/// is registered.
///
/// Cloning a `Buffer` clones the handle, not the data.
pub struct Buffer<T> {
    data: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Element> Buffer<T> {
    /// Wrap an existing vector
    pub fn from_vec(values: Vec<T>) -> Self {
        Self {
            data: Arc::new(RwLock::new(values)),
        }
    }

    /// Allocate `len` copies of `value`
    pub fn filled(what: &'static str, len: usize, value: T) -> Result<Self> {
        Ok(Self::from_vec(try_alloc(what, len, value)?))
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the buffer has no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared access to the contents
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.data.read()
    }

    /// Exclusive access to the contents
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.data.write()
    }

    /// Overwrite the contents with `src`, which must have the same length
    pub fn copy_from(&self, src: &[T]) -> Result<()> {
        let mut data = self.data.write();
        if data.len() != src.len() {
            return Err(Error::LengthMismatch {
                what: "buffer copy",
                expected: data.len(),
                actual: src.len(),
            });
        }
        data.copy_from_slice(src);
        Ok(())
    }

    /// Copy the contents out
    pub fn to_vec(&self) -> Vec<T> {
        self.data.read().clone()
    }

    pub(crate) fn shared(&self) -> Arc<RwLock<Vec<T>>> {
        Arc::clone(&self.data)
    }

    pub(crate) fn erased(&self) -> Arc<dyn Any + Send + Sync> {
        let data: Arc<RwLock<Vec<T>>> = Arc::clone(&self.data);
        data
    }
}

impl<T: Element + std::fmt::Debug> std::fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer").field("data", &*self.data.read()).finish()
    }
}
