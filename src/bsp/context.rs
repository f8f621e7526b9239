//! In-process BSP machine: P ranks running as threads sharing one `Machine`

use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::bsp::barrier::AbortableBarrier;
use crate::bsp::buffer::{Buffer, Element};
use crate::bsp::{check_pid, Bsp, RegId};
use crate::error::{Error, Result};

type Erased = Arc<dyn Any + Send + Sync>;
type Message = Box<dyn Any + Send>;
type StagedOp = Box<dyn FnOnce(&Machine) -> Result<()> + Send>;

/// State shared by all ranks of one run
pub struct Machine {
    nprocs: usize,
    barrier: AbortableBarrier,
    /// Per processor: registered buffers indexed by `RegId`
    registries: Vec<RwLock<Vec<Option<Erased>>>>,
    /// Per destination: batches of messages tagged with the sender
    mailboxes: Vec<Mutex<Vec<(usize, Vec<Message>)>>>,
}

impl Machine {
    /// Create a machine for `nprocs` ranks
    pub fn new(nprocs: usize) -> Self {
        Self {
            nprocs,
            barrier: AbortableBarrier::new(nprocs),
            registries: (0..nprocs).map(|_| RwLock::new(Vec::new())).collect(),
            mailboxes: (0..nprocs).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    /// Number of ranks
    pub fn nprocs(&self) -> usize {
        self.nprocs
    }

    /// Break every barrier; all ranks see [`Error::Aborted`] from now on.
    pub fn abort(&self, pid: usize, reason: &str) {
        self.barrier.abort(pid, reason);
    }

    /// The abort recorded on this machine, if any
    pub fn aborted(&self) -> Option<Error> {
        self.barrier.aborted()
    }

    pub(crate) fn wait(&self) -> Result<()> {
        self.barrier.wait()
    }

    fn lookup<T: Element>(&self, pid: usize, reg: RegId) -> Result<Arc<RwLock<Vec<T>>>> {
        let registry = self.registries[pid].read();
        let erased = registry
            .get(reg.0)
            .and_then(|slot| slot.as_ref())
            .ok_or(Error::NotRegistered { reg, pid })?;
        Arc::clone(erased)
            .downcast::<RwLock<Vec<T>>>()
            .map_err(|_| Error::TypeMismatch { reg, pid })
    }
}

/// One rank's view of a [`Machine`].
///
/// Operations issued between two calls to [`Bsp::sync`] are staged here and
/// executed collectively by the next `sync`.
pub struct ThreadedContext {
    pid: usize,
    machine: Arc<Machine>,
    superstep: usize,
    next_reg: usize,
    pending_regs: Vec<Erased>,
    pending_pops: Vec<RegId>,
    gets: Vec<StagedOp>,
    puts: Vec<StagedOp>,
    outbox: Vec<Vec<Message>>,
    inbox: VecDeque<Message>,
}

impl ThreadedContext {
    /// Attach rank `pid` to `machine`
    pub fn new(pid: usize, machine: Arc<Machine>) -> Self {
        let nprocs = machine.nprocs();
        assert!(pid < nprocs, "pid {} out of range for {} processors", pid, nprocs);
        Self {
            pid,
            machine,
            superstep: 0,
            next_reg: 0,
            pending_regs: Vec::new(),
            pending_pops: Vec::new(),
            gets: Vec::new(),
            puts: Vec::new(),
            outbox: (0..nprocs).map(|_| Vec::new()).collect(),
            inbox: VecDeque::new(),
        }
    }

    /// The machine this rank belongs to
    pub fn machine(&self) -> &Arc<Machine> {
        &self.machine
    }

    /// Run the staged work of one superstep. Any error here is raised on
    /// this rank only, so the caller turns it into an abort.
    fn exchange(&mut self) -> Result<()> {
        let machine = Arc::clone(&self.machine);

        if !self.pending_regs.is_empty() {
            let mut registry = machine.registries[self.pid].write();
            registry.extend(self.pending_regs.drain(..).map(Some));
        }
        machine.wait()?;

        let expected = machine.registries[self.pid].read().len();
        for (pid, registry) in machine.registries.iter().enumerate() {
            let found = registry.read().len();
            if found != expected {
                return Err(Error::RegistrationMismatch {
                    pid,
                    expected,
                    found,
                });
            }
        }

        for op in self.gets.drain(..) {
            op(&machine)?;
        }
        machine.wait()?;

        for op in self.puts.drain(..) {
            op(&machine)?;
        }
        for (dst, batch) in self.outbox.iter_mut().enumerate() {
            if !batch.is_empty() {
                machine.mailboxes[dst]
                    .lock()
                    .push((self.pid, std::mem::take(batch)));
            }
        }
        if !self.pending_pops.is_empty() {
            let mut registry = machine.registries[self.pid].write();
            for reg in self.pending_pops.drain(..) {
                registry[reg.0] = None;
            }
        }
        machine.wait()?;

        let mut batches = std::mem::take(&mut *machine.mailboxes[self.pid].lock());
        batches.sort_by_key(|(src, _)| *src);
        self.inbox.clear();
        self.inbox
            .extend(batches.into_iter().flat_map(|(_, messages)| messages));
        Ok(())
    }
}

impl Bsp for ThreadedContext {
    fn pid(&self) -> usize {
        self.pid
    }

    fn nprocs(&self) -> usize {
        self.machine.nprocs()
    }

    fn superstep(&self) -> usize {
        self.superstep
    }

    fn sync(&mut self) -> Result<()> {
        trace!(
            pid = self.pid,
            superstep = self.superstep,
            gets = self.gets.len(),
            puts = self.puts.len(),
            "sync"
        );
        match self.exchange() {
            Ok(()) => {
                self.superstep += 1;
                Ok(())
            }
            Err(err @ Error::Aborted { .. }) => Err(err),
            Err(err) => {
                self.machine.abort(self.pid, &err.to_string());
                Err(err)
            }
        }
    }

    fn push_reg<T: Element>(&mut self, buffer: &Buffer<T>) -> RegId {
        let reg = RegId(self.next_reg);
        self.next_reg += 1;
        self.pending_regs.push(buffer.erased());
        reg
    }

    fn pop_reg(&mut self, reg: RegId) -> Result<()> {
        if reg.0 >= self.next_reg {
            return Err(Error::NotRegistered { reg, pid: self.pid });
        }
        self.pending_pops.push(reg);
        Ok(())
    }

    fn put<T: Element>(&mut self, pid: usize, src: &[T], reg: RegId, offset: usize) -> Result<()> {
        check_pid(pid, self.nprocs())?;
        let values = src.to_vec();
        self.puts.push(Box::new(move |machine: &Machine| {
            let target = machine.lookup::<T>(pid, reg)?;
            let mut data = target.write();
            let capacity = data.len();
            let slot = data
                .get_mut(offset..offset + values.len())
                .ok_or(Error::OutOfBounds {
                    pid,
                    offset,
                    len: values.len(),
                    capacity,
                })?;
            slot.copy_from_slice(&values);
            Ok(())
        }));
        Ok(())
    }

    fn get<T: Element>(
        &mut self,
        pid: usize,
        reg: RegId,
        offset: usize,
        len: usize,
        dst: &Buffer<T>,
        dst_offset: usize,
    ) -> Result<()> {
        check_pid(pid, self.nprocs())?;
        let local = self.pid;
        let dst = dst.shared();
        self.gets.push(Box::new(move |machine: &Machine| {
            let values = {
                let source = machine.lookup::<T>(pid, reg)?;
                let data = source.read_recursive();
                data.get(offset..offset + len)
                    .ok_or(Error::OutOfBounds {
                        pid,
                        offset,
                        len,
                        capacity: data.len(),
                    })?
                    .to_vec()
            };
            let mut out = dst.write();
            let capacity = out.len();
            out.get_mut(dst_offset..dst_offset + len)
                .ok_or(Error::OutOfBounds {
                    pid: local,
                    offset: dst_offset,
                    len,
                    capacity,
                })?
                .copy_from_slice(&values);
            Ok(())
        }));
        Ok(())
    }

    fn get_indexed<T: Element>(
        &mut self,
        reg: RegId,
        owners: Arc<[usize]>,
        offsets: Arc<[usize]>,
        dst: &Buffer<T>,
    ) -> Result<()> {
        if owners.len() != offsets.len() {
            return Err(Error::LengthMismatch {
                what: "gather offsets",
                expected: owners.len(),
                actual: offsets.len(),
            });
        }
        let nprocs = self.nprocs();
        if let Some(&pid) = owners.iter().find(|&&pid| pid >= nprocs) {
            return Err(Error::InvalidProcessor { pid, nprocs });
        }
        let local = self.pid;
        let dst = dst.shared();
        self.gets.push(Box::new(move |machine: &Machine| {
            let mut sources: Vec<Option<Arc<RwLock<Vec<T>>>>> = vec![None; nprocs];
            for &pid in owners.iter() {
                if sources[pid].is_none() {
                    sources[pid] = Some(machine.lookup::<T>(pid, reg)?);
                }
            }

            let values = {
                let guards: Vec<_> = sources
                    .iter()
                    .map(|source| source.as_ref().map(|s| s.read_recursive()))
                    .collect();
                owners
                    .iter()
                    .zip(offsets.iter())
                    .map(|(&pid, &offset)| {
                        // Every owner was looked up above
                        let data = guards[pid].as_ref().ok_or(Error::NotRegistered { reg, pid })?;
                        data.get(offset).copied().ok_or(Error::OutOfBounds {
                            pid,
                            offset,
                            len: 1,
                            capacity: data.len(),
                        })
                    })
                    .collect::<Result<Vec<T>>>()?
            };

            let mut out = dst.write();
            if out.len() != values.len() {
                return Err(Error::OutOfBounds {
                    pid: local,
                    offset: 0,
                    len: values.len(),
                    capacity: out.len(),
                });
            }
            out.copy_from_slice(&values);
            Ok(())
        }));
        Ok(())
    }

    fn send<M: Send + 'static>(&mut self, pid: usize, message: M) -> Result<()> {
        check_pid(pid, self.nprocs())?;
        self.outbox[pid].push(Box::new(message));
        Ok(())
    }

    fn move_messages<M: 'static>(&mut self) -> Result<Vec<M>> {
        // The queue is left intact when any message has another type
        if !self.inbox.iter().all(|message| message.is::<M>()) {
            return Err(Error::MessageType);
        }
        let mut out = Vec::with_capacity(self.inbox.len());
        while let Some(message) = self.inbox.pop_front() {
            if let Ok(message) = message.downcast::<M>() {
                out.push(*message);
            }
        }
        Ok(out)
    }

    fn queue_len(&self) -> usize {
        self.inbox.len()
    }

    fn abort(&self, reason: &str) -> Error {
        self.machine.abort(self.pid, reason);
        Error::Aborted {
            pid: self.pid,
            reason: reason.to_string(),
        }
    }
}
