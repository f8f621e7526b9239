//! Vector distributions and the routing between them
//!
//! A dense vector of global length `n` is spread over the processors by a
//! [`VectorDistribution`]. The collectively built [`OwnershipTable`] records
//! where every global component lives; resolving a list of global indices
//! against it yields a [`Routing`], the fixed communication pattern that
//! [`RemoteGather`] replays every time the vector's values change.

pub mod distribution;
pub mod gather;
pub mod ownership;
pub mod redistribute;

pub use distribution::{block_owners, cyclic_owners, random_owners, VectorDistribution};
pub use gather::RemoteGather;
pub use ownership::{GlobalOwnership, OwnershipTable, Routing};
pub use redistribute::Redistribution;
