//! The pair of jump tables behind the two hook domains.

use kdispatch_common::{CgroupTailCallIndex, SockVerdict, XdpTailCallIndex, XdpVerdict};

use crate::{config::FallbackPolicy, table::JumpTable};

/// Connect-domain table: one handler per address family.
pub type CgroupJumpTable<S> = JumpTable<CgroupTailCallIndex, S, SockVerdict>;

/// Edge-domain table: the stages of the packet pipeline.
pub type XdpJumpTable<X> = JumpTable<XdpTailCallIndex, X, XdpVerdict>;

/// Owns the connect-hook and the edge jump tables.
///
/// `S` is the socket-address context of the connect hooks and `X` the packet
/// context of the edge hook. The tables are separate values with distinct
/// index types: slot 0 of one has nothing to do with slot 0 of the other.
///
/// The loader populates the tables through [`cgroup_mut`](Self::cgroup_mut)
/// and [`xdp_mut`](Self::xdp_mut) before events flow; hook invocations only
/// need `&self`.
pub struct Dispatcher<S, X> {
    cgroup: CgroupJumpTable<S>,
    xdp: XdpJumpTable<X>,
    fallback: FallbackPolicy,
}

impl<S, X> Dispatcher<S, X> {
    /// Creates a dispatcher with empty tables.
    ///
    /// `fallback` decides what an event gets when its slot is empty. There is
    /// deliberately no default for it.
    pub fn new(fallback: FallbackPolicy) -> Self {
        Self {
            cgroup: JumpTable::new(),
            xdp: JumpTable::new(),
            fallback,
        }
    }

    pub fn fallback(&self) -> &FallbackPolicy {
        &self.fallback
    }

    pub fn cgroup(&self) -> &CgroupJumpTable<S> {
        &self.cgroup
    }

    pub fn cgroup_mut(&mut self) -> &mut CgroupJumpTable<S> {
        &mut self.cgroup
    }

    pub fn xdp(&self) -> &XdpJumpTable<X> {
        &self.xdp
    }

    pub fn xdp_mut(&mut self) -> &mut XdpJumpTable<X> {
        &mut self.xdp
    }

    /// Entry point of the `cgroup/connect4` and `cgroup/connect6` hooks.
    pub fn connect(&self, family: CgroupTailCallIndex, ctx: &mut S) -> SockVerdict {
        self.cgroup.dispatch_or(family, ctx, self.fallback.connect)
    }

    /// Entry point of the edge hook. Enters the pipeline at its first stage.
    pub fn edge(&self, ctx: &mut X) -> XdpVerdict {
        self.xdp
            .dispatch_or(XdpTailCallIndex::PoliciesCheck, ctx, self.fallback.xdp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> Dispatcher<(), ()> {
        Dispatcher::new(FallbackPolicy {
            connect: SockVerdict::Reject,
            xdp: XdpVerdict::Drop,
        })
    }

    #[test]
    fn empty_tables_apply_fallback() {
        let d = dispatcher();
        assert_eq!(
            d.connect(CgroupTailCallIndex::Connect4, &mut ()),
            SockVerdict::Reject
        );
        assert_eq!(d.edge(&mut ()), XdpVerdict::Drop);
    }

    #[test]
    fn tables_are_independent() {
        let mut d = dispatcher();
        d.cgroup_mut()
            .install_fn(CgroupTailCallIndex::Connect4, |_, _| SockVerdict::Allow)
            .unwrap();

        assert_eq!(
            d.connect(CgroupTailCallIndex::Connect4, &mut ()),
            SockVerdict::Allow
        );
        assert_eq!(d.xdp().indices().count(), 0);
        assert_eq!(d.edge(&mut ()), XdpVerdict::Drop);
    }
}
