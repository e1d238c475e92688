//! The tail-call ABI shared by the kdispatch eBPF programs and their loader.
//!
//! Two jump tables exist, one per attachment domain. The connect-hook table
//! ([`CGROUP_TAIL_CALL_MAP`]) holds one handler per address family and the
//! edge table ([`XDP_TAIL_CALL_MAP`]) holds the stages of the packet
//! pipeline. Both tables have [`MAP_SIZE_OF_TAIL_CALL_PROG`] slots.
//!
//! Slot numbers are defined here, once, by the closed enumerations
//! [`CgroupTailCallIndex`] and [`XdpTailCallIndex`]. The loader and the
//! kernel programs both depend on this crate, so a slot can never mean one
//! thing to the loader and another thing to the program jumping into it.
#![no_std]

mod index;
mod verdict;

pub use index::{CgroupTailCallIndex, TailCallIndex, XdpTailCallIndex};
pub use verdict::{Fallback, SockVerdict, XdpVerdict};

/// Number of slots in each jump table.
pub const MAP_SIZE_OF_TAIL_CALL_PROG: u32 = 8;

/// Maximum number of chained tail calls the kernel allows for one event.
///
/// A tail call attempted after this many successful ones fails exactly like a
/// tail call into an empty slot.
pub const MAX_TAIL_CALL_CNT: u32 = 33;

/// Name of the `BPF_MAP_TYPE_PROG_ARRAY` holding the connect handlers.
pub const CGROUP_TAIL_CALL_MAP: &str = "MAP_OF_CGR_TAIL_CALL";

/// Name of the `BPF_MAP_TYPE_PROG_ARRAY` holding the edge pipeline stages.
pub const XDP_TAIL_CALL_MAP: &str = "MAP_OF_XDP_TAILCALL";

/// Name of the global holding the [`Fallback`] verdicts.
pub const FALLBACK_GLOBAL: &str = "FALLBACK";

const _: () = {
    let mut i = 0;
    while i < CgroupTailCallIndex::ALL.len() {
        assert!((CgroupTailCallIndex::ALL[i] as u32) < MAP_SIZE_OF_TAIL_CALL_PROG);
        i += 1;
    }
    let mut i = 0;
    while i < XdpTailCallIndex::ALL.len() {
        assert!((XdpTailCallIndex::ALL[i] as u32) < MAP_SIZE_OF_TAIL_CALL_PROG);
        i += 1;
    }
};
