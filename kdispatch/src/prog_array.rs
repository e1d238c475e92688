//! Populating the kernel jump tables of a loaded eBPF object.

use std::{io, marker::PhantomData};

use aya::{
    maps::{Map, MapData, MapError, ProgramArray},
    programs::{ProgramError, ProgramFd},
    Ebpf, EbpfLoader,
};
use kdispatch_common::{
    CgroupTailCallIndex, Fallback, TailCallIndex, XdpTailCallIndex, FALLBACK_GLOBAL,
};
use log::{debug, info};

use crate::{
    error::{DispatchError, Result},
    plan::TailCallPlan,
    table::ProgramRegistry,
};

/// The `BPF_MAP_TYPE_PROG_ARRAY` indexed by `I`, as found in a loaded object.
///
/// # Examples
///
/// ```no_run
/// # let mut ebpf = aya::Ebpf::load(&[])?;
/// use aya::programs::CgroupSockAddr;
/// use kdispatch::{ProgArrayRegistry, ProgramRegistry as _};
/// use kdispatch::common::CgroupTailCallIndex;
///
/// let handler: &mut CgroupSockAddr = ebpf
///     .program_mut("cgroup_connect4_tail")
///     .unwrap()
///     .try_into()?;
/// handler.load()?;
/// let fd = handler.fd()?.try_clone()?;
///
/// let mut table = ProgArrayRegistry::<CgroupTailCallIndex>::new(&mut ebpf)?;
/// table.install(CgroupTailCallIndex::Connect4, fd)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ProgArrayRegistry<'a, I> {
    array: ProgramArray<&'a mut MapData>,
    _index: PhantomData<fn(I)>,
}

impl<'a, I: TailCallIndex> ProgArrayRegistry<'a, I> {
    pub fn new(ebpf: &'a mut Ebpf) -> Result<Self> {
        let map = ebpf
            .map_mut(I::MAP_NAME)
            .ok_or(DispatchError::MapNotFound { name: I::MAP_NAME })?;
        Self::from_map(map)
    }

    /// Wraps `map`, which must be a `BPF_MAP_TYPE_PROG_ARRAY`.
    pub fn from_map(map: &'a mut Map) -> Result<Self> {
        Ok(Self {
            array: ProgramArray::try_from(map)?,
            _index: PhantomData,
        })
    }
}

impl<I: TailCallIndex> ProgramRegistry<I> for ProgArrayRegistry<'_, I> {
    type Program = ProgramFd;

    fn install(&mut self, index: I, program: ProgramFd) -> Result<()> {
        self.array.set(index.index(), &program, 0)?;
        debug!("{}: installed program at `{}`", I::MAP_NAME, index.name());
        Ok(())
    }

    fn remove(&mut self, index: I) -> Result<()> {
        match self.array.clear_index(&index.index()) {
            Ok(()) => {
                debug!("{}: cleared `{}`", I::MAP_NAME, index.name());
                Ok(())
            }
            Err(error) if is_empty_slot(&error) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

/// Whether `error` is the kernel refusing to delete an empty slot.
fn is_empty_slot(error: &MapError) -> bool {
    match error {
        MapError::ElementNotFound => true,
        MapError::SyscallError(error) => error.io_error.kind() == io::ErrorKind::NotFound,
        _ => false,
    }
}

/// Both jump tables of `ebpf`, borrowed at the same time.
fn registries(
    ebpf: &mut Ebpf,
) -> Result<(
    ProgArrayRegistry<'_, CgroupTailCallIndex>,
    ProgArrayRegistry<'_, XdpTailCallIndex>,
)> {
    let mut cgroup = None;
    let mut xdp = None;
    for (name, map) in ebpf.maps_mut() {
        if name == CgroupTailCallIndex::MAP_NAME {
            cgroup = Some(map);
        } else if name == XdpTailCallIndex::MAP_NAME {
            xdp = Some(map);
        }
    }
    let cgroup = cgroup.ok_or(DispatchError::MapNotFound {
        name: CgroupTailCallIndex::MAP_NAME,
    })?;
    let xdp = xdp.ok_or(DispatchError::MapNotFound {
        name: XdpTailCallIndex::MAP_NAME,
    })?;
    Ok((
        ProgArrayRegistry::from_map(cgroup)?,
        ProgArrayRegistry::from_map(xdp)?,
    ))
}

/// Installs every entry of `plan` into the jump tables of `ebpf`.
///
/// All programs named by the plan must already be loaded. Programs and maps
/// are all looked up before the first slot is written, so a plan naming a
/// missing program leaves both tables as they were. The tables are expected
/// to be populated before the entry programs are attached.
pub fn install_plan(ebpf: &mut Ebpf, plan: &TailCallPlan) -> Result<()> {
    let resolved = plan.resolve(|name| program_fd(ebpf, name), |name| program_fd(ebpf, name))?;
    let (mut cgroup, mut xdp) = registries(ebpf)?;
    resolved.install(&mut cgroup, &mut xdp)?;
    info!(
        "installed {} connect handlers and {} edge stages",
        plan.cgroup().len(),
        plan.xdp().len()
    );
    Ok(())
}

fn program_fd(ebpf: &Ebpf, name: &str) -> Result<ProgramFd> {
    let program = ebpf
        .program(name)
        .ok_or_else(|| DispatchError::ProgramNotFound {
            name: name.to_owned(),
        })?;
    let into_err = |error: ProgramError| DispatchError::Program {
        name: name.to_owned(),
        error,
    };
    program
        .fd()
        .map_err(into_err)?
        .try_clone()
        .map_err(|e| into_err(e.into()))
}

/// Writes the fall-through verdicts into the object being loaded.
pub fn set_fallback<'l, 'a>(
    loader: &'l mut EbpfLoader<'a>,
    fallback: &'a Fallback,
) -> &'l mut EbpfLoader<'a> {
    loader.set_global(FALLBACK_GLOBAL, fallback, true)
}

#[cfg(test)]
mod tests {
    use aya::sys::SyscallError;

    use super::*;

    fn syscall_error(code: i32) -> MapError {
        MapError::SyscallError(SyscallError {
            call: "bpf_map_delete_elem",
            io_error: io::Error::from_raw_os_error(code),
        })
    }

    #[test]
    fn deleting_an_empty_slot_is_not_an_error() {
        // ENOENT
        assert!(is_empty_slot(&syscall_error(2)));
        assert!(is_empty_slot(&MapError::ElementNotFound));
    }

    #[test]
    fn other_delete_failures_surface() {
        // EPERM, EINVAL
        assert!(!is_empty_slot(&syscall_error(1)));
        assert!(!is_empty_slot(&syscall_error(22)));
        assert!(!is_empty_slot(&MapError::OutOfBounds {
            index: 8,
            max_entries: 8
        }));
    }
}
