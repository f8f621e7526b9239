//! Symmetric positive-definite test problems

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dist::random_owners;
use crate::error::{Error, Result};
use crate::io::{MatrixFile, VectorFile};
use crate::matrix::{reference_spmv, Triplet};

/// Added to every diagonal entry on top of the off-diagonal row sum
const DOMINANCE_MARGIN: f64 = 2.0;

/// Parameters of a generated problem
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Matrix size
    pub n: usize,
    /// Off-diagonal nonzeros drawn per row, before symmetrisation
    pub per_row: usize,
    /// Processors the matrix and vectors are distributed over
    pub nprocs: usize,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            n: 100,
            per_row: 4,
            nprocs: num_cpus::get(),
            seed: 0,
        }
    }
}

/// A generated system with its files: the matrix with a random 2D
/// distribution of the nonzeros, the right-hand side `b = A·1` with a random
/// distribution, and a random distribution for the solution.
#[derive(Debug, Clone)]
pub struct Problem {
    pub matrix: MatrixFile,
    pub rhs: VectorFile,
    pub solution: VectorFile,
}

/// Symmetric, strictly diagonally dominant `n × n` matrix with positive
/// diagonal, hence positive definite.
///
/// Each row draws up to `per_row` distinct off-diagonal partners; every pair
/// is stored in both orientations with one value. The diagonal is the
/// absolute off-diagonal row sum plus a margin of 2.
pub fn spd_matrix(n: usize, per_row: usize, seed: u64) -> Vec<Triplet<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut pairs = BTreeSet::new();
    if n > 1 {
        for i in 0..n {
            for _ in 0..per_row {
                let j = rng.gen_range(0..n);
                if j != i {
                    pairs.insert((i.min(j), i.max(j)));
                }
            }
        }
    }

    let mut diagonal = vec![DOMINANCE_MARGIN; n];
    let mut triplets = Vec::with_capacity(2 * pairs.len() + n);
    for (i, j) in pairs {
        let magnitude = rng.gen_range(0.1..1.0);
        let value = if rng.gen_bool(0.5) { magnitude } else { -magnitude };
        diagonal[i] += magnitude;
        diagonal[j] += magnitude;
        triplets.push(Triplet::new(i, j, value));
        triplets.push(Triplet::new(j, i, value));
    }
    triplets.extend(diagonal.into_iter().enumerate().map(|(i, d)| Triplet::new(i, i, d)));
    triplets
}

/// Assigns every nonzero to a uniformly random processor
pub fn partition_nonzeros(n: usize, triplets: &[Triplet<f64>], nprocs: usize, seed: u64) -> MatrixFile {
    let owners = random_owners(triplets.len(), nprocs, seed);
    let mut parts = vec![Vec::new(); nprocs];
    for (t, &q) in triplets.iter().zip(&owners) {
        parts[q].push(*t);
    }
    MatrixFile::from_parts(n, parts)
}

/// Generates the matrix and both vector files of one problem
pub fn generate_problem(config: &GeneratorConfig) -> Result<Problem> {
    if config.nprocs == 0 {
        return Err(Error::Config("at least one processor is required".into()));
    }
    let n = config.n;
    let triplets = spd_matrix(n, config.per_row, config.seed);
    let rhs = reference_spmv(n, &triplets, &vec![1.0; n]);

    Ok(Problem {
        matrix: partition_nonzeros(n, &triplets, config.nprocs, config.seed.wrapping_add(1)),
        rhs: VectorFile {
            n,
            nprocs: config.nprocs,
            owners: random_owners(n, config.nprocs, config.seed.wrapping_add(2)),
            values: Some(rhs),
        },
        solution: VectorFile {
            n,
            nprocs: config.nprocs,
            owners: random_owners(n, config.nprocs, config.seed.wrapping_add(3)),
            values: None,
        },
    })
}
