//! Launching an SPMD program on a dedicated rayon pool

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use crate::bsp::context::{Machine, ThreadedContext};
use crate::bsp::Bsp;
use crate::error::{Error, Result};

/// Runs `program` on `nprocs` ranks and collects each rank's result,
/// indexed by pid.
///
/// The ranks run on a rayon pool of exactly `nprocs` threads, one rank per
/// thread (`ThreadPool::broadcast`). `program` must not itself use that
/// pool's parallel iterators, because every thread blocks at the barriers.
///
/// If any rank fails, the machine is aborted so that the other ranks leave
/// their barriers, and the first error that is not [`Error::Aborted`] is
/// returned. A panicking rank aborts the machine and the panic is resumed
/// once all ranks have stopped.
///
/// # Examples
///
/// ```
/// use bspcg::bsp::{self, Bsp, Buffer};
///
/// let sums = bsp::run(3, |ctx| {
///     let partials = Buffer::filled("partials", ctx.nprocs(), 0usize)?;
///     let reg = ctx.push_reg(&partials);
///     ctx.sync()?;
///     for t in 0..ctx.nprocs() {
///         ctx.put(t, &[ctx.pid() + 1], reg, ctx.pid())?;
///     }
///     ctx.sync()?;
///     let total: usize = partials.read().iter().sum();
///     Ok(total)
/// })
/// .unwrap();
/// assert_eq!(sums, vec![6, 6, 6]);
/// ```
pub fn run<R, F>(nprocs: usize, program: F) -> Result<Vec<R>>
where
    R: Send,
    F: Fn(&mut ThreadedContext) -> Result<R> + Sync,
{
    if nprocs == 0 {
        return Err(Error::Config("at least one processor is required".into()));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(nprocs)
        .thread_name(|i| format!("bsp-rank-{}", i))
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;
    let machine = Arc::new(Machine::new(nprocs));
    debug!(nprocs, "starting BSP run");

    let outcomes = pool.broadcast(|bc| {
        let pid = bc.index();
        let mut ctx = ThreadedContext::new(pid, Arc::clone(&machine));
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let result = program(&mut ctx);
            // Collective end: nobody leaves while a peer still needs a barrier
            result.and_then(|value| machine.wait().map(|()| value))
        }));
        match &outcome {
            Ok(Err(Error::Aborted { .. })) | Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                error!(pid, %err, "processor failed, aborting run");
                machine.abort(pid, &err.to_string());
            }
            Err(_) => machine.abort(pid, "processor panicked"),
        }
        outcome
    });

    let mut results = Vec::with_capacity(nprocs);
    let mut first_error: Option<Error> = None;
    for outcome in outcomes {
        match outcome {
            Err(panic) => resume_unwind(panic),
            Ok(Ok(value)) => results.push(value),
            Ok(Err(err)) => {
                let replace = match (&first_error, &err) {
                    (None, _) => true,
                    (Some(Error::Aborted { .. }), e) => !matches!(e, Error::Aborted { .. }),
                    _ => false,
                };
                if replace {
                    first_error = Some(err);
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(results),
    }
}
