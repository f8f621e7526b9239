//! A reusable barrier that can be broken by an abort

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    aborted: Option<(usize, String)>,
}

/// Barrier for a fixed number of participants.
///
/// Unlike `std::sync::Barrier`, a waiter can be released early by
/// [`AbortableBarrier::abort`]; every current and future `wait` then
/// returns [`Error::Aborted`].
#[derive(Debug)]
pub struct AbortableBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl AbortableBarrier {
    /// Create a barrier for `parties` participants
    pub fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                aborted: None,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Block until all participants have called `wait`.
    pub fn wait(&self) -> Result<()> {
        let mut state = self.state.lock();
        if let Some((pid, reason)) = &state.aborted {
            return Err(aborted(*pid, reason));
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return Ok(());
        }

        while state.generation == generation && state.aborted.is_none() {
            self.cvar.wait(&mut state);
        }

        // A completed generation wins over a later abort
        if state.generation != generation {
            return Ok(());
        }
        match &state.aborted {
            Some((pid, reason)) => Err(aborted(*pid, reason)),
            None => Ok(()),
        }
    }

    /// Break the barrier. Only the first abort is recorded.
    pub fn abort(&self, pid: usize, reason: &str) {
        let mut state = self.state.lock();
        if state.aborted.is_none() {
            state.aborted = Some((pid, reason.to_string()));
        }
        self.cvar.notify_all();
    }

    /// The recorded abort, if any
    pub fn aborted(&self) -> Option<Error> {
        let state = self.state.lock();
        state.aborted.as_ref().map(|(pid, reason)| aborted(*pid, reason))
    }
}

fn aborted(pid: usize, reason: &str) -> Error {
    Error::Aborted {
        pid,
        reason: reason.to_string(),
    }
}
