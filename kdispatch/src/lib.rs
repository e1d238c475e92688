//! User-space side of the kdispatch tail-call layer.
//!
//! The kernel half of kdispatch (the `kdispatch-ebpf` crate) splits the
//! connect and packet processing of a service mesh data plane into small
//! programs chained through two `BPF_MAP_TYPE_PROG_ARRAY` jump tables. This
//! crate is the other half of that contract:
//!
//! * [`ProgramRegistry`] and [`TryDispatch`] are the write and read sides of
//!   a jump table. The loader owns the former, stage programs use the latter.
//! * [`JumpTable`] and [`Dispatcher`] model the two tables in-process, with
//!   the same fall-through and chaining rules as the kernel. They are what
//!   stage logic is exercised against without a kernel.
//! * [`TailCallPlan`] and [`DispatchConfig`] describe which program goes in
//!   which slot, validated against the stage enumerations of
//!   `kdispatch-common` when the configuration is read.
//! * [`ProgArrayRegistry`], [`install_plan`] and [`set_fallback`] apply a
//!   plan and the fall-through verdicts to an object loaded with [aya].
//!
//! # Fall-through
//!
//! Dispatching into an empty slot is not an error. Control returns to the
//! caller, which has to produce a verdict on its own. Whether that verdict
//! accepts or rejects is a property of the deployment, so it is always
//! supplied through [`FallbackPolicy`]; this crate never picks one.
//!
//! [aya]: https://docs.rs/aya
#![deny(clippy::all)]

mod config;
mod dispatcher;
mod error;
mod plan;
mod prog_array;
mod table;

pub use kdispatch_common as common;

pub use config::{DispatchConfig, FallbackPolicy};
pub use dispatcher::{CgroupJumpTable, Dispatcher, XdpJumpTable};
pub use error::{DispatchError, Result};
pub use plan::{ResolvedPlan, StageRef, Table, TailCallEntry, TailCallPlan};
pub use prog_array::{install_plan, set_fallback, ProgArrayRegistry};
pub use table::{
    program, Invocation, JumpTable, Program, ProgramRef, ProgramRegistry, TryDispatch,
};
