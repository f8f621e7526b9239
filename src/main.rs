//! Command line front end: distributed solve, sequential solve and test
//! problem generation

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use bspcg::generate::{generate_problem, GeneratorConfig};
use bspcg::io::problem_paths;
use bspcg::{sequential_cg, solve, BspConfig, MatrixFile, SolveInputs, SolverConfig, VectorFile};

#[derive(Parser)]
#[command(name = "bspcg", version)]
#[command(about = "Conjugate gradient over BSP sparse matrix-vector multiplication", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve A·u = b on P in-process processors
    Solve {
        /// Distributed matrix file
        matrix: PathBuf,

        /// Right-hand side distribution file with values
        rhs: PathBuf,

        /// Solution distribution file
        solution: PathBuf,

        /// Number of processors (default: available cores)
        #[arg(short, long)]
        procs: Option<usize>,

        #[command(flatten)]
        solver: SolverArgs,
    },

    /// Solve A·u = b sequentially
    Seq {
        /// Matrix file; the processor grouping is ignored
        matrix: PathBuf,

        /// Right-hand side file with values
        rhs: PathBuf,

        #[command(flatten)]
        solver: SolverArgs,
    },

    /// Write a random SPD test problem: PREFIX.mtx, PREFIX.v and PREFIX.u
    Generate {
        /// Matrix size
        #[arg(short = 'n', long, default_value_t = 100)]
        size: usize,

        /// Off-diagonal nonzeros drawn per row
        #[arg(short = 'k', long, default_value_t = 4)]
        per_row: usize,

        /// Number of processors to distribute over
        #[arg(short, long)]
        procs: Option<usize>,

        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        #[arg(short, long, default_value = "problem")]
        output_prefix: PathBuf,
    },
}

#[derive(clap::Args)]
struct SolverArgs {
    /// Relative residual at which CG stops
    #[arg(long, default_value_t = SolverConfig::default().tolerance)]
    tolerance: f64,

    /// Iteration cap
    #[arg(long, default_value_t = SolverConfig::default().max_iterations)]
    max_iterations: usize,
}

impl SolverArgs {
    fn config(&self) -> SolverConfig {
        SolverConfig::default()
            .with_tolerance(self.tolerance)
            .with_max_iterations(self.max_iterations)
    }
}

fn bsp_config(procs: Option<usize>) -> BspConfig {
    procs.map(BspConfig::with_nprocs).unwrap_or_default()
}

fn print_solution(values: &[f64]) {
    for (g, value) in values.iter().enumerate() {
        println!("{} {:e}", g + 1, value);
    }
}

fn execute(command: Commands) -> bspcg::Result<()> {
    match command {
        Commands::Solve {
            matrix,
            rhs,
            solution,
            procs,
            solver,
        } => {
            let inputs = SolveInputs::read(&matrix, &rhs, &solution)?;
            let start = Instant::now();
            let result = solve(&inputs, &bsp_config(procs), &solver.config())?;
            info!(elapsed_ms = start.elapsed().as_millis() as u64, "distributed solve finished");
            print_solution(&result.values);
            println!("% {}", result.report);
        }

        Commands::Seq { matrix, rhs, solver } => {
            let matrix = MatrixFile::read(&matrix)?;
            if matrix.rows != matrix.cols {
                return Err(bspcg::Error::NotSquare {
                    rows: matrix.rows,
                    cols: matrix.cols,
                });
            }
            let rhs = VectorFile::read(&rhs)?;
            let b = rhs.values.ok_or_else(|| {
                bspcg::Error::Config("the right-hand side file carries no values".into())
            })?;
            let start = Instant::now();
            let (u, report) = sequential_cg(matrix.rows, &matrix.triplets, &b, &solver.config())?;
            info!(elapsed_ms = start.elapsed().as_millis() as u64, "sequential solve finished");
            print_solution(&u);
            println!("% {}", report);
        }

        Commands::Generate {
            size,
            per_row,
            procs,
            seed,
            output_prefix,
        } => {
            let config = GeneratorConfig {
                n: size,
                per_row,
                nprocs: bsp_config(procs).nprocs,
                seed,
            };
            let problem = generate_problem(&config)?;
            let (matrix, rhs, solution) = problem_paths(&output_prefix);
            problem.matrix.write(&matrix)?;
            problem.rhs.write(&rhs)?;
            problem.solution.write(&solution)?;
            info!(
                n = size,
                nnz = problem.matrix.triplets.len(),
                nprocs = config.nprocs,
                matrix = %matrix.display(),
                "problem written"
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "bspcg failed");
            ExitCode::FAILURE
        }
    }
}
