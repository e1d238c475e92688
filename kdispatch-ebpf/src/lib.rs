//! Kernel side of the kdispatch tail-call layer.
//!
//! This crate owns the two jump tables and the only functions allowed to
//! jump through them. Programs never call `bpf_tail_call` directly: they go
//! through [`workload_tail_call`] or [`xdp_tail_call`], whose index types pin
//! each call to its own table.
#![cfg_attr(target_arch = "bpf", no_std)]

use aya_ebpf::{
    macros::map,
    maps::ProgramArray,
    programs::{SockAddrContext, XdpContext},
};
use kdispatch_common::{
    CgroupTailCallIndex, Fallback, TailCallIndex as _, XdpTailCallIndex,
    MAP_SIZE_OF_TAIL_CALL_PROG,
};

/// Connect handlers, indexed by [`CgroupTailCallIndex`].
#[map]
static MAP_OF_CGR_TAIL_CALL: ProgramArray =
    ProgramArray::with_max_entries(MAP_SIZE_OF_TAIL_CALL_PROG, 0);

/// Edge pipeline stages, indexed by [`XdpTailCallIndex`].
#[map]
static MAP_OF_XDP_TAILCALL: ProgramArray =
    ProgramArray::with_max_entries(MAP_SIZE_OF_TAIL_CALL_PROG, 0);

/// Verdicts applied when a dispatch falls through. Set by the loader.
#[no_mangle]
static FALLBACK: Fallback = Fallback::fail_closed();

/// Jumps to the connect handler registered at `index`.
///
/// Returns only if no program is installed there (or the tail call budget of
/// the event is spent); the caller must then produce the verdict itself.
#[inline(always)]
pub fn workload_tail_call(ctx: &SockAddrContext, index: CgroupTailCallIndex) {
    // SAFETY: on success control never comes back, so nothing after this
    // call relies on state the jump would skip.
    let _ = unsafe { MAP_OF_CGR_TAIL_CALL.tail_call(ctx, index.index()) };
}

/// Jumps to the edge pipeline stage registered at `index`.
///
/// Same contract as [`workload_tail_call`], over the edge table.
#[inline(always)]
pub fn xdp_tail_call(ctx: &XdpContext, index: XdpTailCallIndex) {
    // SAFETY: see `workload_tail_call`.
    let _ = unsafe { MAP_OF_XDP_TAILCALL.tail_call(ctx, index.index()) };
}

pub mod fallback {
    use super::FALLBACK;

    #[inline(always)]
    fn load() -> kdispatch_common::Fallback {
        // The loader rewrites the global's initial value, so the compiler
        // must not fold the constant.
        unsafe { core::ptr::read_volatile(&FALLBACK) }
    }

    /// Verdict for a connect hook whose handler slot is empty.
    #[inline(always)]
    pub fn connect() -> i32 {
        load().connect
    }

    /// Verdict for an edge hook whose stage slot is empty.
    #[inline(always)]
    pub fn xdp() -> u32 {
        load().xdp
    }
}
