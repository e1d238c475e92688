#![cfg_attr(target_arch = "bpf", no_std)]
#![cfg_attr(target_arch = "bpf", no_main)]

use aya_ebpf::{
    macros::{cgroup_sock_addr, xdp},
    programs::{SockAddrContext, XdpContext},
};
use aya_log_ebpf::{debug, info};
use kdispatch_common::{CgroupTailCallIndex, SockVerdict, XdpTailCallIndex, XdpVerdict};
use kdispatch_ebpf::{fallback, workload_tail_call, xdp_tail_call};

// Hook entry points. Each jumps into its table and, when the slot is empty,
// returns the fallback verdict the loader configured.

#[cgroup_sock_addr(connect4)]
pub fn cgroup_connect4(ctx: SockAddrContext) -> i32 {
    workload_tail_call(&ctx, CgroupTailCallIndex::Connect4);
    debug!(&ctx, "connect4: no handler installed, applying fallback");
    fallback::connect()
}

#[cgroup_sock_addr(connect6)]
pub fn cgroup_connect6(ctx: SockAddrContext) -> i32 {
    workload_tail_call(&ctx, CgroupTailCallIndex::Connect6);
    debug!(&ctx, "connect6: no handler installed, applying fallback");
    fallback::connect()
}

#[xdp]
pub fn xdp_authz(ctx: XdpContext) -> u32 {
    xdp_tail_call(&ctx, XdpTailCallIndex::PoliciesCheck);
    debug!(&ctx, "xdp: no policies_check stage installed, applying fallback");
    fallback::xdp()
}

// Tail targets used by tests. They carry no policy: the connect handlers
// allow and the edge stages defer to the next stage until the last one.

#[cgroup_sock_addr(connect4)]
pub fn cgroup_connect4_tail(ctx: SockAddrContext) -> i32 {
    info!(&ctx, ">> tail called into cgroup_connect4_tail");
    SockVerdict::Allow as i32
}

#[cgroup_sock_addr(connect6)]
pub fn cgroup_connect6_tail(ctx: SockAddrContext) -> i32 {
    info!(&ctx, ">> tail called into cgroup_connect6_tail");
    SockVerdict::Allow as i32
}

#[xdp]
pub fn xdp_policies_check_tail(ctx: XdpContext) -> u32 {
    xdp_tail_call(&ctx, XdpTailCallIndex::PolicyCheck);
    debug!(&ctx, "policies_check: policy_check missing, applying fallback");
    fallback::xdp()
}

#[xdp]
pub fn xdp_policy_check_tail(ctx: XdpContext) -> u32 {
    xdp_tail_call(&ctx, XdpTailCallIndex::AuthInUserSpace);
    debug!(&ctx, "policy_check: auth_in_user_space missing, applying fallback");
    fallback::xdp()
}

#[xdp]
pub fn xdp_auth_in_user_space_tail(ctx: XdpContext) -> u32 {
    info!(&ctx, ">> tail called into xdp_auth_in_user_space_tail");
    XdpVerdict::Pass as u32
}

#[cfg(target_arch = "bpf")]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

#[cfg(not(target_arch = "bpf"))]
fn main() {}
