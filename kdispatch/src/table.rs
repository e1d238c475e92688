//! An in-process model of a `BPF_MAP_TYPE_PROG_ARRAY` jump table.
//!
//! [`JumpTable`] behaves like the kernel map from the point of view of the
//! programs jumping through it: installing overwrites a slot, dispatching into
//! an empty slot falls through, a successful dispatch hands the context to the
//! installed program, and an event can chain at most
//! [`MAX_TAIL_CALL_CNT`] times.

use std::{fmt, marker::PhantomData, sync::Arc};

use kdispatch_common::{TailCallIndex, MAP_SIZE_OF_TAIL_CALL_PROG, MAX_TAIL_CALL_CNT};
use log::{debug, trace};

use crate::error::{DispatchError, Result};

/// Write side of a jump table, held by the loader.
pub trait ProgramRegistry<I: TailCallIndex> {
    /// The program reference stored in a slot.
    type Program;

    /// Installs `program` at `index`, replacing whatever was there.
    ///
    /// Fails if `index` does not fit in the table.
    fn install(&mut self, index: I, program: Self::Program) -> Result<()>;

    /// Empties the slot at `index`. Emptying an empty slot is not an error.
    fn remove(&mut self, index: I) -> Result<()>;
}

/// Read side of a jump table, used by the programs themselves.
pub trait TryDispatch<I: TailCallIndex, C, V> {
    /// Transfers `inv` to the program at `index`.
    ///
    /// Returns `Some(verdict)` when a program ran, and `None` when the slot is
    /// empty or the event has spent its tail call budget. On `None` the
    /// context is untouched and the caller must decide the verdict.
    fn try_dispatch(&self, index: I, inv: &mut Invocation<'_, C>) -> Option<V>;
}

/// A program that can be installed in a [`JumpTable`].
///
/// `table` is the table the program was reached through. A program that
/// wants the next stage of its pipeline dispatches into it explicitly;
/// returning ends the event with the returned verdict.
pub trait Program<I: TailCallIndex, C, V>: Send + Sync {
    fn run(&self, table: &dyn TryDispatch<I, C, V>, inv: &mut Invocation<'_, C>) -> V;
}

impl<I, C, V, F> Program<I, C, V> for F
where
    I: TailCallIndex,
    F: Fn(&dyn TryDispatch<I, C, V>, &mut Invocation<'_, C>) -> V + Send + Sync,
{
    fn run(&self, table: &dyn TryDispatch<I, C, V>, inv: &mut Invocation<'_, C>) -> V {
        self(table, inv)
    }
}

/// One hook event travelling through the tables.
///
/// Wraps the hook's native context, which is forwarded as is, together with
/// the number of tail calls taken so far.
pub struct Invocation<'a, C> {
    ctx: &'a mut C,
    tail_calls: u32,
}

impl<'a, C> Invocation<'a, C> {
    pub fn new(ctx: &'a mut C) -> Self {
        Self { ctx, tail_calls: 0 }
    }

    pub fn ctx(&self) -> &C {
        self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut C {
        self.ctx
    }

    /// Number of successful dispatches made for this event.
    pub fn tail_calls(&self) -> u32 {
        self.tail_calls
    }
}

/// A shared handle to an installed program.
pub type ProgramRef<I, C, V> = Arc<dyn Program<I, C, V>>;

/// Wraps a closure as an installable program.
pub fn program<I, C, V, F>(f: F) -> ProgramRef<I, C, V>
where
    I: TailCallIndex,
    F: Fn(&dyn TryDispatch<I, C, V>, &mut Invocation<'_, C>) -> V + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A fixed-capacity table of programs indexed by `I`.
///
/// The capacity `N` defaults to [`MAP_SIZE_OF_TAIL_CALL_PROG`]. Mutation
/// needs `&mut self`, so a table shared between concurrently dispatching
/// events (for instance behind an [`Arc`]) is read-only for all of them.
pub struct JumpTable<I, C, V, const N: usize = { MAP_SIZE_OF_TAIL_CALL_PROG as usize }> {
    slots: [Option<ProgramRef<I, C, V>>; N],
    _index: PhantomData<fn(I)>,
}

impl<I: TailCallIndex, C, V, const N: usize> JumpTable<I, C, V, N> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            _index: PhantomData,
        }
    }

    /// Number of slots.
    pub const fn capacity(&self) -> u32 {
        N as u32
    }

    fn check_bounds(&self, index: I) -> Result<usize> {
        let raw = index.index();
        if raw as usize >= N {
            Err(DispatchError::OutOfBounds {
                index: raw,
                max_entries: self.capacity(),
            })
        } else {
            Ok(raw as usize)
        }
    }

    /// Returns the program installed at `index`, if any.
    pub fn get(&self, index: I) -> Option<&ProgramRef<I, C, V>> {
        self.slots.get(index.index() as usize)?.as_ref()
    }

    /// An iterator over the enumerated indices that hold a program.
    pub fn indices(&self) -> impl Iterator<Item = I> + '_ {
        I::ALL.iter().copied().filter(|i| self.get(*i).is_some())
    }

    /// Empties every slot.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Installs a closure as the program at `index`.
    pub fn install_fn<F>(&mut self, index: I, f: F) -> Result<()>
    where
        F: Fn(&dyn TryDispatch<I, C, V>, &mut Invocation<'_, C>) -> V + Send + Sync + 'static,
    {
        self.install(index, Arc::new(f))
    }

    /// Dispatches `ctx` to `index` as a new event, returning `fallback` on
    /// fall-through.
    ///
    /// This is the shape every hook entry point has: jump, and if nothing is
    /// there, apply the caller's own default.
    pub fn dispatch_or(&self, index: I, ctx: &mut C, fallback: V) -> V {
        let mut inv = Invocation::new(ctx);
        self.try_dispatch(index, &mut inv).unwrap_or(fallback)
    }
}

impl<I: TailCallIndex, C, V, const N: usize> Default for JumpTable<I, C, V, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: TailCallIndex, C, V, const N: usize> ProgramRegistry<I> for JumpTable<I, C, V, N> {
    type Program = ProgramRef<I, C, V>;

    fn install(&mut self, index: I, program: Self::Program) -> Result<()> {
        let slot = self.check_bounds(index)?;
        if self.slots[slot].replace(program).is_some() {
            debug!("{}: replaced program at `{}`", I::MAP_NAME, index.name());
        } else {
            debug!("{}: installed program at `{}`", I::MAP_NAME, index.name());
        }
        Ok(())
    }

    fn remove(&mut self, index: I) -> Result<()> {
        let slot = self.check_bounds(index)?;
        if self.slots[slot].take().is_some() {
            debug!("{}: cleared `{}`", I::MAP_NAME, index.name());
        }
        Ok(())
    }
}

impl<I: TailCallIndex, C, V, const N: usize> TryDispatch<I, C, V> for JumpTable<I, C, V, N> {
    fn try_dispatch(&self, index: I, inv: &mut Invocation<'_, C>) -> Option<V> {
        if inv.tail_calls >= MAX_TAIL_CALL_CNT {
            trace!(
                "{}: tail call limit reached before `{}`",
                I::MAP_NAME,
                index.name()
            );
            return None;
        }
        let Some(program) = self.get(index) else {
            trace!(
                "{}: `{}` is empty, falling through",
                I::MAP_NAME,
                index.name()
            );
            return None;
        };
        inv.tail_calls += 1;
        Some(program.run(self, inv))
    }
}

impl<I: TailCallIndex, C, V, const N: usize> fmt::Debug for JumpTable<I, C, V, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JumpTable")
            .field("map", &I::MAP_NAME)
            .field("capacity", &N)
            .field(
                "installed",
                &self.indices().map(TailCallIndex::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
