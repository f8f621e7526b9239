//! Input files and their distribution over the processors

pub mod distribute;
pub mod files;

pub use distribute::{distribute_matrix, distribute_vector, DistributedVector};
pub use files::{problem_paths, MatrixFile, VectorFile};
