use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use kdispatch::{
    common::{CgroupTailCallIndex, SockVerdict, XdpTailCallIndex, XdpVerdict},
    Dispatcher, FallbackPolicy, ProgramRegistry as _,
};

/// Stand-in for the socket address of a connect hook.
#[derive(Debug, Default)]
struct SockAddr {
    port: u16,
}

/// Stand-in for an XDP packet, recording the stages it went through.
#[derive(Debug, Default)]
struct Packet {
    src_port: u16,
    stages: Vec<&'static str>,
}

fn dispatcher() -> Dispatcher<SockAddr, Packet> {
    Dispatcher::new(FallbackPolicy {
        connect: SockVerdict::Allow,
        xdp: XdpVerdict::Pass,
    })
}

#[test_log::test]
fn connect_dispatches_per_family() {
    let mut d = dispatcher();
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = handled.clone();
    d.cgroup_mut()
        .install_fn(CgroupTailCallIndex::Connect4, move |_, inv| {
            counter.fetch_add(1, Ordering::Relaxed);
            if inv.ctx().port == 23 {
                SockVerdict::Reject
            } else {
                SockVerdict::Allow
            }
        })
        .unwrap();

    let mut telnet = SockAddr { port: 23 };
    assert_eq!(
        d.connect(CgroupTailCallIndex::Connect4, &mut telnet),
        SockVerdict::Reject
    );

    // No connect6 handler: the caller's default applies and the handler
    // never sees the event.
    assert_eq!(
        d.connect(CgroupTailCallIndex::Connect6, &mut telnet),
        SockVerdict::Allow
    );
    assert_eq!(handled.load(Ordering::Relaxed), 1);
    assert_eq!(telnet.port, 23);
}

#[test_log::test]
fn coarse_stage_falls_through_when_fine_stage_is_missing() {
    let mut d = dispatcher();
    d.xdp_mut()
        .install_fn(XdpTailCallIndex::PoliciesCheck, |table, inv| {
            inv.ctx_mut().stages.push("policies_check");
            match table.try_dispatch(XdpTailCallIndex::PolicyCheck, inv) {
                Some(verdict) => verdict,
                // The coarse stage's own answer to a missing fine stage.
                None => XdpVerdict::Drop,
            }
        })
        .unwrap();

    let mut packet = Packet::default();
    assert_eq!(d.edge(&mut packet), XdpVerdict::Drop);
    assert_eq!(packet.stages, ["policies_check"]);
}

#[test_log::test]
fn stages_chain_only_when_they_ask_to() {
    let mut d = dispatcher();
    d.xdp_mut()
        .install_fn(XdpTailCallIndex::PoliciesCheck, |table, inv| {
            inv.ctx_mut().stages.push("policies_check");
            // Cheap rejection of a well-known bad port.
            if inv.ctx().src_port == 0 {
                return XdpVerdict::Drop;
            }
            table
                .try_dispatch(XdpTailCallIndex::PolicyCheck, inv)
                .unwrap_or(XdpVerdict::Drop)
        })
        .unwrap();
    d.xdp_mut()
        .install_fn(XdpTailCallIndex::PolicyCheck, |table, inv| {
            inv.ctx_mut().stages.push("policy_check");
            table
                .try_dispatch(XdpTailCallIndex::AuthInUserSpace, inv)
                .unwrap_or(XdpVerdict::Drop)
        })
        .unwrap();
    d.xdp_mut()
        .install_fn(XdpTailCallIndex::AuthInUserSpace, |_, inv| {
            inv.ctx_mut().stages.push("auth_in_user_space");
            XdpVerdict::Pass
        })
        .unwrap();

    let mut resolved_early = Packet::default();
    assert_eq!(d.edge(&mut resolved_early), XdpVerdict::Drop);
    assert_eq!(resolved_early.stages, ["policies_check"]);

    let mut deferred = Packet {
        src_port: 443,
        ..Default::default()
    };
    assert_eq!(d.edge(&mut deferred), XdpVerdict::Pass);
    assert_eq!(
        deferred.stages,
        ["policies_check", "policy_check", "auth_in_user_space"]
    );
}

#[test_log::test]
fn replacing_a_stage_takes_effect_for_the_next_event() {
    let mut d = dispatcher();
    d.xdp_mut()
        .install_fn(XdpTailCallIndex::PoliciesCheck, |_, _| XdpVerdict::Drop)
        .unwrap();
    assert_eq!(d.edge(&mut Packet::default()), XdpVerdict::Drop);

    d.xdp_mut()
        .install_fn(XdpTailCallIndex::PoliciesCheck, |_, _| XdpVerdict::Tx)
        .unwrap();
    assert_eq!(d.edge(&mut Packet::default()), XdpVerdict::Tx);

    d.xdp_mut().remove(XdpTailCallIndex::PoliciesCheck).unwrap();
    assert_eq!(d.edge(&mut Packet::default()), XdpVerdict::Pass);
}

#[test_log::test]
fn slot_zero_of_each_table_is_unrelated() {
    let mut d = dispatcher();
    d.xdp_mut()
        .install_fn(XdpTailCallIndex::PoliciesCheck, |_, _| XdpVerdict::Drop)
        .unwrap();

    assert!(d.cgroup().get(CgroupTailCallIndex::Connect4).is_none());
    assert_eq!(
        d.connect(CgroupTailCallIndex::Connect4, &mut SockAddr::default()),
        SockVerdict::Allow
    );
}
